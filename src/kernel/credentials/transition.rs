//! Irreversible drop from root to the target account.
//!
//! CRITICAL: GID before UID. Every step is fatal; a failed step means no
//! later step runs.

use super::validation::validate_ids;
use crate::config::types::{LaunchError, ProcessIds, Result, TargetIdentity};
use crate::kernel::host::Host;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropPolicy {
    /// Missing passwd/group entry is fatal.
    pub require_account: bool,
    /// setgroups([]) before the gid change (root callers only).
    pub clear_groups: bool,
}

impl Default for DropPolicy {
    fn default() -> Self {
        Self {
            require_account: false,
            clear_groups: true,
        }
    }
}

/// validate -> resolve account -> clear groups -> gid -> uid -> verify.
pub fn transition_to_unprivileged<H: Host>(
    host: &mut H,
    identity: TargetIdentity,
    policy: DropPolicy,
) -> Result<ProcessIds> {
    let TargetIdentity { uid, gid } = identity;

    validate_ids(uid, gid)?;
    let user = resolve_account(&*host, identity, policy.require_account)?;

    log::info!(
        "Dropping privileges to user {} ({}:{})...",
        user.as_deref().unwrap_or("<unnamed>"),
        uid,
        gid
    );

    let groups_cleared = policy.clear_groups && clear_supplementary_groups(host)?;

    // CRITICAL: GID before UID
    host.set_gid(gid)
        .map_err(|e| LaunchError::Privilege(format!("Failed to set GID {}: {}", gid, e)))?;
    log::debug!("Set GID to {}", gid);

    host.set_uid(uid)
        .map_err(|e| LaunchError::Privilege(format!("Failed to set UID {}: {}", uid, e)))?;
    log::debug!("Set UID to {}", uid);

    verify_transition(&*host, identity, groups_cleared)
}

fn resolve_account<H: Host>(
    host: &H,
    identity: TargetIdentity,
    require_account: bool,
) -> Result<Option<String>> {
    let user = lookup(host.user_name(identity.uid), "user", identity.uid, require_account)?;
    let group = lookup(host.group_name(identity.gid), "group", identity.gid, require_account)?;

    if user.is_none() || group.is_none() {
        log::warn!(
            "No account entry for {} (user={:?}, group={:?}); dropping by numeric id",
            identity,
            user,
            group
        );
    }

    Ok(user)
}

fn lookup(
    found: nix::Result<Option<String>>,
    kind: &str,
    id: u32,
    require_account: bool,
) -> Result<Option<String>> {
    match found {
        Ok(Some(name)) => Ok(Some(name)),
        Ok(None) if require_account => Err(LaunchError::Privilege(format!(
            "No {} entry for id {} on this host",
            kind, id
        ))),
        Ok(None) => Ok(None),
        Err(e) if require_account => Err(LaunchError::Privilege(format!(
            "Failed to look up {} {}: {}",
            kind, id, e
        ))),
        Err(e) => {
            log::debug!("{} lookup for {} failed: {}", kind, id, e);
            Ok(None)
        }
    }
}

/// Returns whether setgroups ran.
fn clear_supplementary_groups<H: Host>(host: &mut H) -> Result<bool> {
    // Only root has supplementary groups worth shedding, and only root may
    // call setgroups.
    if host.current_ids().euid != 0 {
        log::debug!("Not running as root; leaving supplementary groups as they are");
        return Ok(false);
    }

    host.clear_supplementary_groups().map_err(|e| {
        LaunchError::Privilege(format!("Failed to clear supplementary groups: {}", e))
    })?;
    log::debug!("Cleared supplementary groups");
    Ok(true)
}

fn verify_transition<H: Host>(
    host: &H,
    expected: TargetIdentity,
    groups_cleared: bool,
) -> Result<ProcessIds> {
    let ids = host.current_ids();

    if ids.uid != expected.uid || ids.euid != expected.uid {
        return Err(LaunchError::Privilege(format!(
            "UID verification failed: expected {}, got real={}, effective={}",
            expected.uid, ids.uid, ids.euid
        )));
    }

    if ids.gid != expected.gid || ids.egid != expected.gid {
        return Err(LaunchError::Privilege(format!(
            "GID verification failed: expected {}, got real={}, effective={}",
            expected.gid, ids.gid, ids.egid
        )));
    }

    if groups_cleared {
        let groups = host.supplementary_groups().map_err(|e| {
            LaunchError::Privilege(format!("Failed to read supplementary groups: {}", e))
        })?;
        // Some kernels report the egid in the list; anything else survived setgroups.
        let stale: Vec<u32> = groups.into_iter().filter(|g| *g != expected.gid).collect();
        if !stale.is_empty() {
            return Err(LaunchError::Privilege(format!(
                "Supplementary group verification failed: still member of {:?}",
                stale
            )));
        }
    }

    log::debug!("UID/GID verification passed: {}", ids);
    Ok(ids)
}
