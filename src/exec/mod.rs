//! Execution control
//!
//! Builds the exec request and drives the type-state launch chain.

pub mod argv;
pub mod launcher;
