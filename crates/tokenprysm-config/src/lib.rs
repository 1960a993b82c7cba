//! TokenPrysm Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.tokenprysm/config.toml`
//! - Local config: `.tokenprysm/config.toml` (in workspace)
//! - Programmatic overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use tokenprysm_core::BuildOptions;

/// Root configuration for the token parser.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Which tokens to drop during normalization
    pub ignore: IgnoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Ignore rules applied while normalizing tokens.
///
/// # Example TOML
///
/// ```toml
/// [ignore]
/// deprecated = true
/// tokens = ["internal.*", "legacy.color.*"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Drop tokens whose resolved `$deprecated` is active
    pub deprecated: bool,

    /// Glob patterns; drop tokens whose dotted ID matches any
    pub tokens: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// Programmatic overrides applied over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override `ignore.deprecated`
    pub ignore_deprecated: Option<bool>,

    /// Replace `ignore.tokens`
    pub ignore_tokens: Option<Vec<String>>,

    /// Override log level
    pub log_level: Option<String>,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ParserConfig {
    /// Apply overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(deprecated) = overrides.ignore_deprecated {
            self.ignore.deprecated = deprecated;
        }
        if let Some(ref tokens) = overrides.ignore_tokens {
            self.ignore.tokens = tokens.clone();
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if self.ignore.tokens.iter().any(|pattern| pattern.is_empty()) {
            return Err(ConfigError::ValidationError(
                "ignore.tokens must not contain empty patterns".to_string(),
            ));
        }
        Ok(())
    }

    /// Build options for the core pipeline.
    pub fn to_build_options(&self) -> BuildOptions {
        BuildOptions {
            ignore_deprecated: self.ignore.deprecated,
            ignore_tokens: self.ignore.tokens.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert!(!config.ignore.deprecated);
        assert!(config.ignore.tokens.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = ParserConfig::default();
        let overrides = ConfigOverrides {
            ignore_deprecated: Some(true),
            ignore_tokens: Some(vec!["internal.*".to_string()]),
            log_level: Some("debug".to_string()),
        };

        config.apply_overrides(&overrides);

        assert!(config.ignore.deprecated);
        assert_eq!(config.ignore.tokens, ["internal.*"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let mut config = ParserConfig::default();
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_validate_rejects_empty_pattern() {
        let mut config = ParserConfig::default();
        config.ignore.tokens = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_build_options() {
        let config = ParserConfig {
            ignore: IgnoreConfig {
                deprecated: true,
                tokens: vec!["legacy.*".to_string()],
            },
            ..Default::default()
        };
        let options = config.to_build_options();
        assert!(options.ignore_deprecated);
        assert_eq!(options.ignore_tokens, ["legacy.*"]);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ParserConfig {
            ignore: IgnoreConfig {
                deprecated: true,
                tokens: vec!["internal.*".to_string(), "legacy.color.*".to_string()],
            },
            logging: LoggingConfig {
                level: "warn".to_string(),
                format: LogFormat::Json,
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ParserConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: ParserConfig = toml::from_str(
            r#"
            [ignore]
            deprecated = true
            "#,
        )
        .unwrap();
        assert!(parsed.ignore.deprecated);
        assert!(parsed.ignore.tokens.is_empty());
        assert_eq!(parsed.logging.level, "info");
    }
}
