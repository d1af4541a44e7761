//! Configuration
//!
//! Launch config types, deployment presets, environment overlay and
//! startup validation.

pub mod options;
pub mod presets;
pub mod types;
pub mod validator;
