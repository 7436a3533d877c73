//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! [cache]
//! initial_size = 200
//! memory_limit = 4194304
//!
//! [state]
//! max_history = 100
//!
//! [compiler]
//! dev_mode = true
//! ```
//!
//! Every table and field is optional; missing values take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use story_expr::CompilerConfig;

use crate::cache::CacheConfig;
use crate::error::ConfigError;
use crate::state::StateConfig;

/// Configuration for the whole engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub state: StateConfig,
    pub compiler: CompilerConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Check that the values are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.min_size == 0 {
            return invalid("cache.min_size must be at least 1");
        }
        if !(cache.min_size <= cache.initial_size && cache.initial_size <= cache.max_size) {
            return invalid(format!(
                "cache sizes must satisfy min_size <= initial_size <= max_size, got {} / {} / {}",
                cache.min_size, cache.initial_size, cache.max_size
            ));
        }
        if !(cache.target_hit_rate > 0.0 && cache.target_hit_rate <= 1.0) {
            return invalid(format!(
                "cache.target_hit_rate must be in (0, 1], got {}",
                cache.target_hit_rate
            ));
        }
        if cache.adapt_interval == 0 {
            return invalid("cache.adapt_interval must be positive");
        }
        if cache.memory_limit == 0 {
            return invalid("cache.memory_limit must be positive");
        }
        if self.state.max_history == 0 {
            return invalid("state.max_history must be positive");
        }
        if self.compiler.max_depth == 0 {
            return invalid("compiler.max_depth must be positive");
        }
        if self.compiler.cache_size == 0 {
            return invalid("compiler.cache_size must be positive");
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(reason.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.initial_size, 100);
        assert_eq!(config.cache.min_size, 10);
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.cache.adapt_interval, 100);
        assert_eq!(config.cache.memory_limit, 10 * 1024 * 1024);
        assert_eq!(config.state.max_history, 50);
        assert_eq!(config.compiler.max_depth, 100);
        assert_eq!(config.compiler.max_source_len, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [cache]
            initial_size = 50
            target_hit_rate = 0.9

            [compiler]
            dev_mode = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.initial_size, 50);
        assert_eq!(config.cache.target_hit_rate, 0.9);
        assert_eq!(config.cache.max_size, 1000);
        assert!(config.compiler.dev_mode);
        assert_eq!(config.state, StateConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        let err = EngineConfig::from_toml_str("[cache]\ninitial_size = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("[state]\nmax_history = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("[cache]\ntarget_hit_rate = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::from_toml_str("[cache\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = EngineConfig::from_toml_str("[cache]\ninitial_size = \"big\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/story-engine.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
