//! Environment overlay on top of a preset.
//!
//! The launcher's argv belongs to the server, so options are read from
//! `REDIS_INIT_*` variables only. The long flags exist so the same parser
//! can be driven from tests.

use crate::config::presets::Preset;
use crate::config::types::{ArgvZero, LaunchConfig, LaunchError, Result, TunableSetting};
use clap::builder::FalseyValueParser;
use clap::error::{ContextKind, ContextValue};
use clap::{ArgAction, CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

/// Accepted by `REDIS_INIT_LOADER` to drop a preset's loader.
const NO_LOADER: &str = "none";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ArgvZeroMode {
    /// Bare program name (`REDIS_INIT_PROCESS_NAME`, else the server's file name)
    Rename,
    /// Path handed to exec
    ExecPath,
    /// Launcher's own argv[0]
    Inherit,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "redis-init", about = "Tune, drop privileges, exec the server")]
pub struct LaunchOptions {
    /// Base configuration
    #[arg(long, env = "REDIS_INIT_PRESET", value_enum, default_value_t = Preset::Redis)]
    pub preset: Preset,

    /// Target user id
    #[arg(long, env = "REDIS_INIT_UID")]
    pub uid: Option<u32>,

    /// Target group id
    #[arg(long, env = "REDIS_INIT_GID")]
    pub gid: Option<u32>,

    /// Server executable
    #[arg(long, env = "REDIS_INIT_SERVER")]
    pub server: Option<PathBuf>,

    /// Dynamic loader used to start the server, or `none`
    #[arg(long, env = "REDIS_INIT_LOADER")]
    pub loader: Option<String>,

    /// How argv[0] of the server is chosen
    #[arg(long, env = "REDIS_INIT_ARGV0", value_enum)]
    pub argv0: Option<ArgvZeroMode>,

    /// Process name used with `--argv0 rename`
    #[arg(long, env = "REDIS_INIT_PROCESS_NAME")]
    pub process_name: Option<String>,

    /// Overcommit control file
    #[arg(long, env = "REDIS_INIT_OVERCOMMIT_PATH")]
    pub overcommit_path: Option<PathBuf>,

    /// Skip the overcommit step entirely
    #[arg(long, env = "REDIS_INIT_SKIP_TUNING", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub skip_tuning: bool,

    /// Fail when the uid/gid has no passwd/group entry
    #[arg(long, env = "REDIS_INIT_REQUIRE_ACCOUNT", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub require_account: bool,

    /// Keep the caller's supplementary groups
    #[arg(long, env = "REDIS_INIT_KEEP_GROUPS", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub keep_groups: bool,
}

impl LaunchOptions {
    /// Resolve options from the process environment alone.
    pub fn from_env() -> Result<Self> {
        Self::try_parse_from(["redis-init"])
            .map_err(|e| LaunchError::Config(describe_env_error(&e)))
    }

    pub fn into_config(self) -> LaunchConfig {
        let mut config = self.preset.config();

        if let Some(uid) = self.uid {
            config.identity.uid = uid;
        }
        if let Some(gid) = self.gid {
            config.identity.gid = gid;
        }
        if let Some(server) = self.server {
            config.server = server;
        }
        match self.loader.as_deref() {
            Some(NO_LOADER) => config.loader = None,
            Some(loader) => config.loader = Some(PathBuf::from(loader)),
            None => {}
        }

        config.argv0 = match (self.argv0, self.process_name) {
            (Some(ArgvZeroMode::ExecPath), _) => ArgvZero::ExecPath,
            (Some(ArgvZeroMode::Inherit), _) => ArgvZero::Inherit,
            (Some(ArgvZeroMode::Rename), Some(name)) | (None, Some(name)) => ArgvZero::Rename(name),
            (Some(ArgvZeroMode::Rename), None) => ArgvZero::Rename(default_process_name(&config)),
            (None, None) => config.argv0,
        };

        if self.skip_tuning {
            config.tunable = None;
        } else if let Some(path) = self.overcommit_path {
            let value = config
                .tunable
                .map(|t| t.value)
                .unwrap_or_else(|| TunableSetting::overcommit_always().value);
            config.tunable = Some(TunableSetting { path, value });
        }

        config.require_account |= self.require_account;
        if self.keep_groups {
            config.clear_groups = false;
        }

        config
    }
}

/// Restate a clap error in terms of the variable that carried the value.
/// clap describes it by the long flag, which the binary never accepts.
fn describe_env_error(err: &clap::Error) -> String {
    let context = |kind| match err.get(kind) {
        Some(ContextValue::String(text)) => Some(text.as_str()),
        _ => None,
    };
    let var = context(ContextKind::InvalidArg).and_then(env_var_for_flag);
    let value = context(ContextKind::InvalidValue);

    let (Some(var), Some(value)) = (var, value) else {
        let rendered = err.render().to_string();
        let first = rendered.lines().next().unwrap_or_default();
        return first.trim_start_matches("error: ").to_string();
    };

    let mut message = format!("invalid value '{}' for {}", value, var);
    if let Some(source) = std::error::Error::source(err) {
        message.push_str(&format!(": {}", source));
    } else if let Some(ContextValue::Strings(valid)) = err.get(ContextKind::ValidValue) {
        message.push_str(&format!(" (expected one of: {})", valid.join(", ")));
    }
    message
}

/// `--uid <UID>` -> `REDIS_INIT_UID`
fn env_var_for_flag(flag: &str) -> Option<String> {
    let long = flag.trim_start_matches("--").split([' ', '=']).next()?;
    LaunchOptions::command()
        .get_arguments()
        .find(|arg| arg.get_long() == Some(long))
        .and_then(|arg| arg.get_env())
        .map(|env| env.to_string_lossy().into_owned())
}

/// File name of the server, e.g. `redis-server`.
fn default_process_name(config: &LaunchConfig) -> String {
    config
        .server
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.server.to_string_lossy().into_owned())
}
