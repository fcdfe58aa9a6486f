//! Configuration management for the validation engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (validation.toml)
//! - Environment variables (VALIDATION__*)
//!
//! ## Example config file (validation.toml):
//! ```toml
//! [auto]
//! required = true
//! enum_membership = true
//!
//! [pool]
//! max_idle = 64
//!
//! [execution]
//! max_depth = 64
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main configuration for the validation engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Global auto-validator defaults
    #[serde(default)]
    pub auto: AutoConfig,

    /// Message pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Execution limits
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Defaults used when a schema does not override auto-validators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoConfig {
    /// Inject `required` into non-nullable fields that can be missing
    #[serde(default = "default_true")]
    pub required: bool,

    /// Inject `enum` membership into enum fields
    #[serde(default = "default_true")]
    pub enum_membership: bool,
}

/// Message pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Buffers kept for reuse
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

/// Execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Deepest nested/base invocation chain before a call is aborted
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_max_idle() -> usize {
    64
}

fn default_max_depth() -> usize {
    64
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            required: true,
            enum_membership: true,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl ValidationSettings {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "validation.toml",
            ".validation.toml",
            "config/validation.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "validation") {
            let xdg_config = config_dir.config_dir().join("validation.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (VALIDATION__*)
        builder = builder.add_source(
            Environment::with_prefix("VALIDATION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationSettings::default();
        assert!(config.auto.required);
        assert!(config.auto.enum_membership);
        assert_eq!(config.pool.max_idle, 64);
        assert_eq!(config.execution.max_depth, 64);
    }

    #[test]
    fn test_serialize_config() {
        let config = ValidationSettings::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[auto]"));
        assert!(toml_str.contains("[execution]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[auto]\nrequired = false\n\n[pool]\nmax_idle = 8\n").unwrap();

        let config = ValidationSettings::load_from(path.to_str()).unwrap();
        assert!(!config.auto.required);
        assert!(config.auto.enum_membership);
        assert_eq!(config.pool.max_idle, 8);
        assert_eq!(config.execution.max_depth, 64);
    }

    #[test]
    fn test_save_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ValidationSettings::default();
        config.execution.max_depth = 5;
        config.save(&path).unwrap();

        let loaded = ValidationSettings::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.execution.max_depth, 5);
    }
}
