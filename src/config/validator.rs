// Config validation
// Runs once at startup; errors abort the harness before the workspace is touched.

use crate::config::types::{HarnessConfig, HarnessError, Result};

/// Smallest line buffer that still fits both sentinels plus a file name.
pub const MIN_LINE_BYTES: usize = 64;

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

/// Validate config at startup. Returns the warnings on success.
pub fn validate_config(config: &HarnessConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_paths(config, &mut result);

    if !result.is_valid() {
        return Err(HarnessError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &HarnessConfig, result: &mut ValidationResult) {
    if config.cpu_time_limit_secs == 0 {
        result.add_error("cpu_time_limit_secs cannot be zero".to_string());
    }
    if config.wall_time_limit_secs == 0 {
        result.add_error("wall_time_limit_secs cannot be zero".to_string());
    }
    if config.compile_timeout_secs == 0 {
        result.add_error("compile_timeout_secs cannot be zero".to_string());
    }
    if config.max_line_bytes < MIN_LINE_BYTES {
        result.add_error(format!(
            "max_line_bytes {} is below the minimum of {}",
            config.max_line_bytes, MIN_LINE_BYTES
        ));
    }

    // RLIMIT_CPU cannot fire before the watchdog when cpu >= wall.
    if config.cpu_time_limit_secs > 0 && config.cpu_time_limit_secs >= config.wall_time_limit_secs
    {
        result.add_warning(format!(
            "cpu_time_limit_secs ({}) is not below wall_time_limit_secs ({}); CPU-bound programs will be reported as wall-clock timeouts",
            config.cpu_time_limit_secs, config.wall_time_limit_secs
        ));
    }
}

fn validate_paths(config: &HarnessConfig, result: &mut ValidationResult) {
    if config.workspace_root.as_os_str().is_empty() {
        result.add_error("workspace_root cannot be empty".to_string());
    } else if config.workspace_root.parent().is_none() {
        // Purge deletes every regular file in the root.
        result.add_error(format!(
            "workspace_root {} must not be the filesystem root",
            config.workspace_root.display()
        ));
    }

    if let Some(cache_dir) = &config.cache_dir {
        if cache_dir.starts_with(&config.workspace_root) {
            result.add_warning(format!(
                "cache_dir {} lives inside the workspace; cached objects may be visible to submissions",
                cache_dir.display()
            ));
        }
    }
}
