//! Shared type definitions and error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default account ids of the `redis` user in the official images.
pub const DEFAULT_UID: u32 = 999;
pub const DEFAULT_GID: u32 = 999;

/// Control file for `vm.overcommit_memory`.
pub const OVERCOMMIT_CONTROL_PATH: &str = "/proc/sys/vm/overcommit_memory";

/// `1` = always overcommit, never check.
pub const OVERCOMMIT_ALWAYS: &str = "1";

pub const REDIS_SERVER_PATH: &str = "/usr/local/bin/redis-server";
pub const REDIS_SERVER_NAME: &str = "redis-server";
pub const X86_64_LOADER_PATH: &str = "/lib64/ld-linux-x86-64.so.2";

/// Unprivileged account the server runs as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl Default for TargetIdentity {
    fn default() -> Self {
        Self {
            uid: DEFAULT_UID,
            gid: DEFAULT_GID,
        }
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// A kernel tunable and the literal value written to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunableSetting {
    pub path: PathBuf,
    pub value: String,
}

impl TunableSetting {
    /// `vm.overcommit_memory = 1`
    pub fn overcommit_always() -> Self {
        Self {
            path: PathBuf::from(OVERCOMMIT_CONTROL_PATH),
            value: OVERCOMMIT_ALWAYS.to_string(),
        }
    }
}

/// How the first element of the exec'd argument vector is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgvZero {
    /// Bare program name, shown by `ps`/`top`.
    Rename(String),
    /// The path actually passed to exec (loader or server).
    ExecPath,
    /// The caller's own `argv[0]`, untouched.
    Inherit,
}

/// Everything the launcher needs; one value per deployment variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Best-effort tunable step; `None` skips it.
    pub tunable: Option<TunableSetting>,
    pub identity: TargetIdentity,
    /// Server executable.
    pub server: PathBuf,
    /// Dynamic loader used to start `server` indirectly.
    pub loader: Option<PathBuf>,
    pub argv0: ArgvZero,
    /// Treat a uid/gid with no passwd/group entry as fatal.
    pub require_account: bool,
    /// Shed supplementary groups before the gid change.
    pub clear_groups: bool,
}

/// Snapshot of the process credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessIds {
    pub uid: u32,
    pub euid: u32,
    pub gid: u32,
    pub egid: u32,
}

impl fmt::Display for ProcessIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uid={} euid={} gid={} egid={}",
            self.uid, self.euid, self.gid, self.egid
        )
    }
}

/// Fatal launcher errors.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Process error: {0}")]
    Process(String),
}

/// Non-fatal failures of the tunable step.
#[derive(Error, Debug)]
pub enum TunableError {
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LaunchError>;
