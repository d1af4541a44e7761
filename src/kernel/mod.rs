//! Thin wrappers around host kernel primitives.
//!
//! Dependency direction: host -> sysctl -> credentials

pub mod credentials;
pub mod host;
pub mod sysctl;
