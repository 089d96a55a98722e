//! Dump tool configuration.
//!
//! The dump tool is configured entirely from environment variables.
//!
//! # Environment Variables
//!
//! - `NTFS_INDEX_RECORD_PATH`: Record image to open (required)
//! - `NTFS_INDEX_NAME`: Index attribute to dump (default: `$R`)
//! - `NTFS_INDEX_DUMP_INDENT`: Prefix for every dump line (default: empty)
//!
//! # Invariants
//!
//! - `record_path` is never empty
//! - `index_name` is never empty

use std::path::PathBuf;

const RECORD_PATH_VAR: &str = "NTFS_INDEX_RECORD_PATH";
const INDEX_NAME_VAR: &str = "NTFS_INDEX_NAME";
const DUMP_INDENT_VAR: &str = "NTFS_INDEX_DUMP_INDENT";

/// Dump tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpConfig {
    /// Path of the record image to load.
    pub record_path: PathBuf,
    /// Name of the index attribute to dump.
    pub index_name: String,
    /// Prefix written before every dump line.
    pub indent: String,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl DumpConfig {
    /// Default index to dump.
    pub const DEFAULT_INDEX_NAME: &'static str = crate::catalogs::INDEX_NAME;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `NTFS_INDEX_RECORD_PATH` is not set or is empty
    /// - `NTFS_INDEX_NAME` is set but empty
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let record_path = lookup(RECORD_PATH_VAR)
            .ok_or_else(|| ConfigError::MissingEnvVar(RECORD_PATH_VAR.to_string()))?;
        if record_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: RECORD_PATH_VAR.to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let index_name =
            lookup(INDEX_NAME_VAR).unwrap_or_else(|| Self::DEFAULT_INDEX_NAME.to_string());
        if index_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: INDEX_NAME_VAR.to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let indent = lookup(DUMP_INDENT_VAR).unwrap_or_default();

        Ok(Self {
            record_path: PathBuf::from(record_path),
            index_name,
            indent,
        })
    }
}
