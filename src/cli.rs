use crate::config::options::LaunchOptions;
use crate::exec::launcher::launch;
use crate::kernel::host::{Host, LinuxHost};
use anyhow::{Context, Result};
use log::Level;
use std::convert::Infallible;
use std::ffi::OsString;
use std::io::Write;

/// Prefix on every line the launcher prints.
pub const LOG_TAG: &str = "=> [redis-init]";

/// Log filter variable, `info` when unset.
pub const LOG_ENV: &str = "REDIS_INIT_LOG";

/// Exit status for any fatal failure.
pub const EXIT_FATAL: i32 = 1;

fn level_marker(level: Level) -> &'static str {
    match level {
        Level::Error => "FATAL: ",
        Level::Warn => "WARNING: ",
        Level::Info => "",
        Level::Debug | Level::Trace => "debug: ",
    }
}

fn format_line(level: Level, message: &std::fmt::Arguments<'_>) -> String {
    format!("{} {}{}", LOG_TAG, level_marker(level), message)
}

pub fn init_logging() {
    let env = env_logger::Env::new().filter_or(LOG_ENV, "info");
    // try_init: a second call (tests) keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| writeln!(buf, "{}", format_line(record.level(), record.args())))
        .try_init();
}

/// Run the launcher. Only returns on failure; the caller reports the error
/// and exits with [`EXIT_FATAL`].
pub fn run() -> Result<Infallible> {
    init_logging();

    let options = LaunchOptions::from_env().context("Invalid REDIS_INIT_* environment")?;
    let preset = options.preset;
    let config = options.into_config();

    log::debug!("Using preset {} -> {:?}", preset.name(), config);

    let host = LinuxHost;
    let ids = host.current_ids();
    if ids.euid != 0 {
        log::warn!(
            "Not running as root ({}); kernel tuning and the privilege drop may fail",
            ids
        );
    }

    let args: Vec<OsString> = std::env::args_os().collect();
    Err(launch(config, host, &args).into())
}
