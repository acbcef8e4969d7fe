//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides and validate a TOML configuration file.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ManagerConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn load_from_env() -> Result<ManagerConfig, ConfigError> {
    let mut config = ManagerConfig::default();
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `CIRCUIT_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut ManagerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("CIRCUIT_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
    if let Some(v) = lookup("CIRCUIT_ADMIN_BIND") {
        config.admin.bind_address = v;
    }
    if let Some(v) = lookup("CIRCUIT_LOG_LEVEL") {
        config.observability.log_level = v;
    }

    let defaults = &mut config.breakers.defaults;
    if let Some(v) = parse_var(&lookup, "CIRCUIT_FAILURE_THRESHOLD")? {
        defaults.failure_threshold = v;
    }
    if let Some(v) = parse_var(&lookup, "CIRCUIT_FAILURE_RATE_THRESHOLD")? {
        defaults.failure_rate_threshold = v;
    }
    if let Some(v) = parse_var(&lookup, "CIRCUIT_RESET_TIMEOUT_MS")? {
        defaults.reset_timeout_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "CIRCUIT_HALF_OPEN_SUCCESS_THRESHOLD")? {
        defaults.half_open_success_threshold = v;
    }

    Ok(())
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value: raw }),
    }
}
