use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Knobs shared by the build pipeline and the query side.
///
/// Both sides must agree on `index_gram_min`/`index_gram_max`: queries are
/// expanded with the same span range the corpus was indexed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub index_gram_min: usize,
    pub index_gram_max: usize,
    pub suggest_gram_min: usize,
    pub suggest_gram_max: usize,
    pub suggestion_top_n: usize,
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_gram_min: 1,
            index_gram_max: 1,
            suggest_gram_min: 1,
            suggest_gram_max: 3,
            suggestion_top_n: 10,
            max_results: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("index_gram", self.index_gram_min, self.index_gram_max)?;
        check_range("suggest_gram", self.suggest_gram_min, self.suggest_gram_max)?;
        if self.suggestion_top_n == 0 {
            return Err(ConfigError::InvalidTopN);
        }
        Ok(())
    }
}

fn check_range(field: &'static str, min: usize, max: usize) -> Result<(), ConfigError> {
    if min == 0 || min > max {
        return Err(ConfigError::InvalidRange { field, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "index_gram_max": 4 }"#).unwrap();
        assert_eq!(cfg.index_gram_min, 1);
        assert_eq!(cfg.index_gram_max, 4);
        assert_eq!(cfg.suggestion_top_n, 10);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = EngineConfig::from_json_str(r#"{ "suggest_gram_min": 3, "suggest_gram_max": 2 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange { field: "suggest_gram", .. }));
    }

    #[test]
    fn rejects_unknown_fields_and_zero_top_n() {
        assert!(matches!(EngineConfig::from_json_str(r#"{ "stemming": true }"#), Err(ConfigError::Json(_))));
        assert!(matches!(EngineConfig::from_json_str(r#"{ "suggestion_top_n": 0 }"#), Err(ConfigError::InvalidTopN)));
    }
}
