//! Best-effort kernel tunable adjustment.
//!
//! Writing `/proc/sys/vm/overcommit_memory` needs a privileged or
//! non-sandboxed host. It is an optimization for fork-based persistence,
//! so no outcome here ever stops the launch.

use crate::config::types::{TunableError, TunableSetting};
use crate::kernel::host::Host;

#[derive(Debug)]
pub enum TuneOutcome {
    /// Value written.
    Applied,
    /// No tunable configured.
    Disabled,
    /// Open or write failed; startup continues.
    Failed(TunableError),
}

impl TuneOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub fn apply_tunable<H: Host>(host: &mut H, setting: Option<&TunableSetting>) -> TuneOutcome {
    let Some(setting) = setting else {
        log::info!("Kernel tunable step disabled");
        return TuneOutcome::Disabled;
    };

    log::info!("Checking {}...", setting.path.display());

    match host.write_tunable(&setting.path, &setting.value) {
        Ok(()) => {
            log::info!(
                "SUCCESS: {} set to {}.",
                setting.path.display(),
                setting.value
            );
            TuneOutcome::Applied
        }
        Err(e) => {
            log::warn!("{} (continuing)", e);
            TuneOutcome::Failed(e)
        }
    }
}
