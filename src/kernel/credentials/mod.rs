//! UID/GID transitions for privilege dropping.
//!
//! CRITICAL: the gid change MUST happen BEFORE the uid change. Once the uid
//! is gone the process no longer has the right to pick its group.

mod transition;
mod validation;

pub use transition::{transition_to_unprivileged, DropPolicy};
pub use validation::validate_ids;
