//! Exec target and argument vector construction.

use crate::config::types::{ArgvZero, LaunchConfig, LaunchError, Result};
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// A ready-to-exec program path and argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecPlan {
    pub path: CString,
    pub argv: Vec<CString>,
}

impl ExecPlan {
    /// Direct:  `server  [argv0, args[1..]...]`
    /// Loader:  `loader  [argv0, server, args[1..]...]`
    ///
    /// `caller_args` is the launcher's own argv, `argv[0]` included.
    pub fn build(config: &LaunchConfig, caller_args: &[OsString]) -> Result<Self> {
        let exec_path: &Path = config.loader.as_deref().unwrap_or(&config.server);
        let path = to_cstring(exec_path.as_os_str())?;

        let argv0 = match &config.argv0 {
            ArgvZero::Rename(name) => to_cstring(OsStr::new(name))?,
            ArgvZero::ExecPath => path.clone(),
            ArgvZero::Inherit => match caller_args.first() {
                Some(arg) => to_cstring(arg)?,
                None => path.clone(),
            },
        };

        let mut argv = Vec::with_capacity(caller_args.len() + 1);
        argv.push(argv0);
        if config.loader.is_some() {
            argv.push(to_cstring(config.server.as_os_str())?);
        }
        for arg in caller_args.iter().skip(1) {
            argv.push(to_cstring(arg)?);
        }

        Ok(Self { path, argv })
    }

    pub fn display_argv(&self) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

fn to_cstring(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes()).map_err(|_| {
        LaunchError::Config(format!(
            "argument contains NUL byte: {}",
            value.to_string_lossy()
        ))
    })
}
