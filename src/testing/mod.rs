//! Testing infrastructure
//!
//! A recording [`Host`](crate::kernel::host::Host) for exercising the launch
//! sequence without root.

pub mod recording_host;

pub use recording_host::{HostCall, RecordingHost};
