//! Read, validate, and write the `mobius.config.yaml` file, with optional
//! `MOBIUS_*` environment variable overrides layered on top.

use std::path::Path;

use super::error::ConfigError;
use crate::types::config::LoopConfig;
use crate::types::enums::Backend;

/// Does a config file exist at `path`?
pub fn config_exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Read and parse the config file at `path`. Does not apply environment
/// overrides; use [`read_config_with_env`] for that.
pub fn read_config(path: &str) -> Result<LoopConfig, ConfigError> {
    if !Path::new(path).exists() {
        return Err(ConfigError::NotFound(path.to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config: LoopConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read the config file and apply `MOBIUS_*` environment variable overrides.
/// Falls back to [`LoopConfig::default`] if no file exists, so env vars alone
/// are enough to configure a run with no config file at all.
pub fn read_config_with_env(path: &str) -> Result<LoopConfig, ConfigError> {
    let mut config = match read_config(path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => LoopConfig::default(),
        Err(err) => return Err(err),
    };

    if let Ok(val) = std::env::var("MOBIUS_BACKEND") {
        config.backend = match val.to_lowercase().as_str() {
            "linear" => Backend::Linear,
            "jira" => Backend::Jira,
            "local" => Backend::Local,
            other => return Err(ConfigError::ValidationError(vec![format!(
                "MOBIUS_BACKEND: unrecognized backend '{other}'"
            )])),
        };
    }
    if let Ok(val) = std::env::var("MOBIUS_DELAY_SECONDS") {
        config.execution.delay_seconds = val
            .parse()
            .map_err(|_| ConfigError::ValidationError(vec![format!(
                "MOBIUS_DELAY_SECONDS: invalid integer '{val}'"
            )]))?;
    }
    if let Ok(val) = std::env::var("MOBIUS_MAX_ITERATIONS") {
        config.execution.max_iterations = val
            .parse()
            .map_err(|_| ConfigError::ValidationError(vec![format!(
                "MOBIUS_MAX_ITERATIONS: invalid integer '{val}'"
            )]))?;
    }
    if let Ok(val) = std::env::var("MOBIUS_MODEL") {
        config.execution.model = val;
    }
    if let Ok(val) = std::env::var("MOBIUS_SANDBOX_ENABLED") {
        config.execution.sandbox = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(val) = std::env::var("MOBIUS_CONTAINER") {
        config.execution.container_name = val;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Serialize `config` as YAML and write it to `path`, creating parent
/// directories as needed.
pub fn write_config(path: &str, config: &LoopConfig) -> Result<(), ConfigError> {
    validate_config(config)?;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Reject configs with out-of-range values before they reach the executor.
pub fn validate_config(config: &LoopConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.execution.max_iterations == 0 {
        errors.push("execution.max_iterations must be at least 1".to_string());
    }
    if let Some(0) = config.execution.max_parallel_agents {
        errors.push("execution.max_parallel_agents must be at least 1 when set".to_string());
    }
    if let Some(verification) = &config.execution.verification {
        if verification.coverage_threshold > 100 {
            errors.push("execution.verification.coverage_threshold must be <= 100".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors))
    }
}
