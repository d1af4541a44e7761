//! Bootstrap Ordering Enforcement
//!
//! The launch sequence is FIXED:
//! 1. kernel tunable (best-effort, never fatal)
//! 2. setgroups, setgid, then setuid (fatal)
//! 3. exec the server in place (fatal, terminal)
//!
//! Each step consumes the prior state, so the order is checked by the
//! compiler. Only `Launcher<Unprivileged>` can exec:
//!
//! ```compile_fail
//! use redis_init::exec::launcher::{Fresh, Launcher};
//! use redis_init::kernel::host::LinuxHost;
//!
//! let launcher = Launcher::<_, Fresh>::new(Default::default(), LinuxHost);
//! let _ = launcher.exec(&[]);
//! ```
//!
//! and the privilege drop cannot be skipped after tuning:
//!
//! ```compile_fail
//! use redis_init::exec::launcher::{Fresh, Launcher};
//! use redis_init::kernel::host::LinuxHost;
//!
//! let (launcher, _) = Launcher::<_, Fresh>::new(Default::default(), LinuxHost).tune_kernel();
//! let _ = launcher.exec(&[]);
//! ```

use crate::config::types::{LaunchConfig, LaunchError, ProcessIds, Result};
use crate::config::validator::validate_config;
use crate::exec::argv::ExecPlan;
use crate::kernel::credentials::{transition_to_unprivileged, DropPolicy};
use crate::kernel::host::Host;
use crate::kernel::sysctl::{apply_tunable, TuneOutcome};
use std::convert::Infallible;
use std::ffi::OsString;
use std::marker::PhantomData;

/// Type-state marker: nothing done yet
pub struct Fresh;

/// Type-state marker: tunable step attempted
pub struct Tuned;

/// Type-state marker: running as the target account
pub struct Unprivileged;

/// Launch sequence with type-state tracking
pub struct Launcher<H, S> {
    config: LaunchConfig,
    host: H,
    /// Credentials after the drop (set once `Unprivileged`)
    ids: Option<ProcessIds>,
    _state: PhantomData<S>,
}

impl<H, S> Launcher<H, S> {
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    #[cfg(test)]
    fn host(&self) -> &H {
        &self.host
    }

    fn into_state<T>(self) -> Launcher<H, T> {
        Launcher {
            config: self.config,
            host: self.host,
            ids: self.ids,
            _state: PhantomData,
        }
    }
}

impl<H: Host> Launcher<H, Fresh> {
    pub fn new(config: LaunchConfig, host: H) -> Self {
        Self {
            config,
            host,
            ids: None,
            _state: PhantomData,
        }
    }

    /// Attempt the tunable write. Always moves forward.
    pub fn tune_kernel(mut self) -> (Launcher<H, Tuned>, TuneOutcome) {
        let outcome = apply_tunable(&mut self.host, self.config.tunable.as_ref());
        (self.into_state(), outcome)
    }
}

impl<H: Host> Launcher<H, Tuned> {
    /// setgroups -> setgid -> setuid -> verify. Any failure ends the launch.
    pub fn drop_privileges(mut self) -> Result<Launcher<H, Unprivileged>> {
        let policy = DropPolicy {
            require_account: self.config.require_account,
            clear_groups: self.config.clear_groups,
        };

        let ids = transition_to_unprivileged(&mut self.host, self.config.identity, policy)?;
        self.ids = Some(ids);
        Ok(self.into_state())
    }
}

impl<H: Host> Launcher<H, Unprivileged> {
    pub fn ids(&self) -> Option<ProcessIds> {
        self.ids
    }

    /// Replace the process image with the server. Returning at all means
    /// the exec failed.
    pub fn exec(mut self, caller_args: &[OsString]) -> Result<Infallible> {
        let plan = ExecPlan::build(&self.config, caller_args)?;

        if self.config.loader.is_some() {
            log::info!(
                "Starting {} via loader {} as unprivileged user...",
                self.config.server.display(),
                plan.path.to_string_lossy()
            );
        } else {
            log::info!(
                "Starting {} as unprivileged user...",
                plan.path.to_string_lossy()
            );
        }
        if let Some(ids) = self.ids() {
            log::info!("Running as {}", ids);
        }
        log::debug!("execv({:?}, {:?})", plan.path, plan.display_argv());

        let err = match self.host.exec(&plan.path, &plan.argv) {
            Ok(never) => match never {},
            Err(e) => e,
        };

        Err(LaunchError::Process(format!(
            "Failed to exec {}: {}",
            plan.path.to_string_lossy(),
            err
        )))
    }
}

/// Validate `config` and run the whole sequence. Only returns on failure.
pub fn launch<H: Host>(config: LaunchConfig, host: H, caller_args: &[OsString]) -> LaunchError {
    match run(config, host, caller_args) {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

fn run<H: Host>(config: LaunchConfig, host: H, caller_args: &[OsString]) -> Result<Infallible> {
    validate_config(&config)?;

    let (launcher, _outcome) = Launcher::new(config, host).tune_kernel();
    let launcher = launcher.drop_privileges()?;
    launcher.exec(caller_args)
}
