// Startup validation: a bad config fails before any host state is touched.

use crate::config::types::{ArgvZero, LaunchConfig, LaunchError, Result};
use std::path::Path;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a launch config. Any error is fatal; warnings are logged and
/// returned for the caller to inspect.
pub fn validate_config(config: &LaunchConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_identity(config, &mut result);
    validate_paths(config, &mut result);
    validate_argv0(config, &mut result);

    if !result.is_valid() {
        return Err(LaunchError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    for warning in &result.warnings {
        log::warn!("{}", warning);
    }

    Ok(result)
}

fn validate_identity(config: &LaunchConfig, result: &mut ValidationResult) {
    let identity = config.identity;
    if identity.uid == 0 {
        result.add_error("target uid cannot be 0 (root)".to_string());
    }
    if identity.gid == 0 {
        result.add_error("target gid cannot be 0 (root)".to_string());
    }
    if !config.clear_groups {
        result.add_warning(
            "supplementary groups are kept; the server inherits the caller's groups".to_string(),
        );
    }
}

fn validate_paths(config: &LaunchConfig, result: &mut ValidationResult) {
    check_exec_path("server", &config.server, result);

    if let Some(loader) = &config.loader {
        check_exec_path("loader", loader, result);
    }

    if let Some(tunable) = &config.tunable {
        if tunable.path.as_os_str().is_empty() {
            result.add_error("tunable path cannot be empty".to_string());
        }
        if tunable.value.is_empty() {
            result.add_error(format!(
                "tunable value for {} cannot be empty",
                tunable.path.display()
            ));
        }
    }
}

fn check_exec_path(label: &str, path: &Path, result: &mut ValidationResult) {
    if path.as_os_str().is_empty() {
        result.add_error(format!("{} path cannot be empty", label));
        return;
    }
    if !path.is_absolute() {
        result.add_error(format!(
            "{} path must be absolute: {}",
            label,
            path.display()
        ));
    }
}

fn validate_argv0(config: &LaunchConfig, result: &mut ValidationResult) {
    if let ArgvZero::Rename(name) = &config.argv0 {
        if name.is_empty() {
            result.add_error("process name for argv[0] cannot be empty".to_string());
        }
        if name.contains('\0') {
            result.add_error("process name for argv[0] contains NUL byte".to_string());
        }
    }
}
