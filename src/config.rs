//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::query::{DEFAULT_FIELDS, DEFAULT_MAX_DEPTH};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query parser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Fields searched by bare text
    #[serde(default = "default_fields")]
    pub default_fields: Vec<String>,

    /// Deepest group or qref nesting kept
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Entity classes qref clauses may target
    #[serde(default)]
    pub classes: Vec<String>,
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_fields: default_fields(),
            max_depth: default_max_depth(),
            classes: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("entity-query").join("config.toml")),
            Some(PathBuf::from("/etc/entity-query/config.toml")),
            Some(PathBuf::from("./entity-query.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Parser overrides
        if let Some(fields) = lookup("ENTITY_QUERY_DEFAULT_FIELDS") {
            self.parser.default_fields = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(depth) = lookup("ENTITY_QUERY_MAX_DEPTH") {
            if let Ok(d) = depth.parse() {
                self.parser.max_depth = d;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("ENTITY_QUERY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ENTITY_QUERY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# entity-query Configuration
#
# Environment variables override these settings:
# - ENTITY_QUERY_DEFAULT_FIELDS (comma separated)
# - ENTITY_QUERY_MAX_DEPTH
# - ENTITY_QUERY_LOG_LEVEL
# - ENTITY_QUERY_LOG_FORMAT

[parser]
# Fields searched when a query contains plain text
default_fields = ["name"]

# Groups and qrefs nested deeper than this are dropped
max_depth = 32

# Entity classes that qref clauses (field<{Class ...}>) may target
classes = []

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
