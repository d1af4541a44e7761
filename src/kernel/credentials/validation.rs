//! Credential validation logic.

use crate::config::types::{LaunchError, Result};

/// Reject root UIDs/GIDs (0) as a drop target.
pub fn validate_ids(uid: u32, gid: u32) -> Result<()> {
    if uid == 0 || gid == 0 {
        return Err(LaunchError::Privilege(format!(
            "Cannot transition to root UID/GID (uid={}, gid={})",
            uid, gid
        )));
    }
    Ok(())
}
