//! Engine configuration
//!
//! Deserialized from JSON text or a Python dict; every field has a default.

use crate::condition::DEFAULT_CACHE_CAPACITY;
use crate::error::{Result, RuleError};
use serde::Deserialize;

/// Rule engine settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Keep parsed trees keyed by rule text
    pub parse_cache: bool,
    /// Entries kept before the parse cache is reset
    pub max_cached_rules: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parse_cache: true,
            max_cached_rules: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| RuleError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parse_cache && self.max_cached_rules == 0 {
            return Err(RuleError::InvalidConfig(
                "max_cached_rules must be positive when parse_cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.parse_cache);
        assert_eq!(config.max_cached_rules, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(r#"{"max_cached_rules": 16}"#).unwrap();
        assert!(config.parse_cache);
        assert_eq!(config.max_cached_rules, 16);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"max_cached_rules": 0}"#),
            Err(RuleError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"cache": true}"#),
            Err(RuleError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(RuleError::InvalidConfig(_))
        ));

        // Capacity is irrelevant with the cache off
        assert!(EngineConfig::from_json(r#"{"parse_cache": false, "max_cached_rules": 0}"#).is_ok());
    }
}
