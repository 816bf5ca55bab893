//! Engine configuration.
//!
//! [`EngineConfig`] holds the few switches the parser and evaluator honour. It is loaded
//! from YAML, optionally overridden from the environment, and handed explicitly to
//! [`StreamingSqlParser`](crate::rill::sql::parser::StreamingSqlParser) and
//! [`ValuerEval`](crate::rill::sql::execution::expression::evaluator::ValuerEval).
//!
//! ```yaml
//! ignore_case: true
//! integer_float_division: false
//! default_field_prefix: "rill_field_"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding [`EngineConfig::ignore_case`]
pub const ENV_IGNORE_CASE: &str = "RILL_IGNORE_CASE";
/// Environment variable overriding [`EngineConfig::integer_float_division`]
pub const ENV_INTEGER_FLOAT_DIVISION: &str = "RILL_INTEGER_FLOAT_DIVISION";
/// Environment variable overriding [`EngineConfig::default_field_prefix`]
pub const ENV_DEFAULT_FIELD_PREFIX: &str = "RILL_DEFAULT_FIELD_PREFIX";

pub const DEFAULT_FIELD_NAME_PREFIX: &str = "rill_field_";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {file}: {error}")]
    IoError {
        file: PathBuf,
        error: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Switches shared by the parser and evaluator of one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fall back to case-insensitive key matching when a message key is missing
    pub ignore_case: bool,
    /// Integer division produces a float
    pub integer_float_division: bool,
    /// Prefix of synthetic names given to unnamed select fields
    pub default_field_prefix: String,
    /// Skip the post-parse check that rejects aggregates in WHERE
    pub allow_aggregate_in_where: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            integer_float_division: false,
            default_field_prefix: DEFAULT_FIELD_NAME_PREFIX.to_string(),
            allow_aggregate_in_where: false,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| ConfigError::IoError {
            file: path.to_path_buf(),
            error,
        })?;
        let config = Self::from_yaml_str(&content)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Apply `RILL_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Used by [`Self::with_env_overrides`].
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_IGNORE_CASE) {
            self.ignore_case = parse_bool(ENV_IGNORE_CASE, &v)?;
        }
        if let Some(v) = lookup(ENV_INTEGER_FLOAT_DIVISION) {
            self.integer_float_division = parse_bool(ENV_INTEGER_FLOAT_DIVISION, &v)?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_FIELD_PREFIX) {
            if v.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_DEFAULT_FIELD_PREFIX.to_string(),
                    value: v,
                });
            }
            self.default_field_prefix = v;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
