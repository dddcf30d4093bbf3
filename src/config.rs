use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translator configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Maximum nesting of sub-statements within one translation
    #[validate(range(
        min = 1,
        max = 256,
        message = "Max statement depth must be between 1 and 256"
    ))]
    pub max_statement_depth: usize,

    /// Whether to rewrite booleans into integer form (predicate vs value contexts)
    pub emulate_boolean_as_integer: bool,

    /// Alias prefix for mapped tables (`t0`, `t1`, ...)
    #[validate(custom(function = "validate_alias_prefix"))]
    pub table_alias_prefix: String,

    /// Alias prefix for sub-statement tables (`q0`, `q1`, ...)
    #[validate(custom(function = "validate_alias_prefix"))]
    pub sub_statement_alias_prefix: String,

    /// Projection name of the synthetic row number introduced by Skip
    #[validate(length(min = 1, message = "Row number column name cannot be empty"))]
    pub row_number_column_name: String,

    /// Name given to unnamed scalar projections of sub-statements
    #[validate(length(min = 1, message = "Default projection name cannot be empty"))]
    pub default_projection_name: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_statement_depth: 64,
            emulate_boolean_as_integer: true,
            table_alias_prefix: "t".to_string(),
            sub_statement_alias_prefix: "q".to_string(),
            row_number_column_name: "row_number".to_string(),
            default_projection_name: "value".to_string(),
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_statement_depth: parse_env_var("RELQ_MAX_STATEMENT_DEPTH", "64")?,
            emulate_boolean_as_integer: parse_env_var("RELQ_EMULATE_BOOLEAN_AS_INTEGER", "true")?,
            table_alias_prefix: env::var("RELQ_TABLE_ALIAS_PREFIX").unwrap_or_else(|_| "t".to_string()),
            sub_statement_alias_prefix: env::var("RELQ_SUB_STATEMENT_ALIAS_PREFIX")
                .unwrap_or_else(|_| "q".to_string()),
            row_number_column_name: env::var("RELQ_ROW_NUMBER_COLUMN_NAME")
                .unwrap_or_else(|_| "row_number".to_string()),
            default_projection_name: env::var("RELQ_DEFAULT_PROJECTION_NAME")
                .unwrap_or_else(|_| "value".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            max_statement_depth: cli.max_statement_depth,
            emulate_boolean_as_integer: !cli.no_boolean_emulation,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub max_statement_depth: usize,
    pub no_boolean_emulation: bool,
}

fn validate_alias_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        let mut error = ValidationError::new("alias_prefix");
        error.message = Some("Alias prefixes must be non-empty and alphabetic".into());
        return Err(error);
    }
    Ok(())
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
