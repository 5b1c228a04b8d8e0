use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(inner) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), inner),
        )),
        other => other,
    })?;

    config.errors.path = expand_tilde(&config.errors.path);
    Ok(config)
}

/// Parse and validate a YAML document, expanding `$env{VAR}` references
/// first.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml)?;
    check_unexpanded_vars(&yaml)?;

    let config: Config = serde_yaml::from_str(&yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = env_var_pattern()?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_store(&config.store, &mut errors);

    let ingest = &config.ingest;
    if ingest.batch_size == 0 {
        errors.push("ingest.batch_size must be at least 1".to_string());
    }
    if ingest.concurrency == 0 {
        errors.push("ingest.concurrency must be at least 1".to_string());
    }
    if ingest.chunk_size == 0 {
        errors.push("ingest.chunk_size must be at least 1".to_string());
    }
    if ingest.channel_capacity == 0 {
        errors.push("ingest.channel_capacity must be at least 1".to_string());
    }

    if config.progress.interval.is_zero() {
        errors.push("progress.interval must be greater than zero".to_string());
    }

    if config.errors.path.as_os_str().is_empty() {
        errors.push("errors.path cannot be empty".to_string());
    }
    if config.errors.flush_threshold == 0 {
        errors.push("errors.flush_threshold must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if store.url.is_empty() {
        errors.push("store.url cannot be empty".to_string());
    } else if !store.url.starts_with("http://") && !store.url.starts_with("https://") {
        errors.push(format!(
            "store.url '{}' must start with http:// or https://",
            store.url
        ));
    }

    if store.index.is_empty() {
        errors.push("store.index cannot be empty".to_string());
    } else if store.index.chars().any(|c| c.is_whitespace() || c == '/') {
        errors.push(format!(
            "store.index '{}' cannot contain whitespace or '/'",
            store.index
        ));
    }

    if store.timeout.is_zero() {
        errors.push("store.timeout must be greater than zero".to_string());
    }

    if store.password.is_some() && store.username.is_none() {
        errors.push("store.password is set without store.username".to_string());
    }
}
