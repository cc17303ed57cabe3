//! Configuration module

use std::env;
use std::path::PathBuf;

use crate::store::DEFAULT_HISTORY_LIMIT;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Classifier artifact (`.json` LightGBM dump or `.onnx`)
    pub model_path: PathBuf,

    /// SQLite file holding prediction history
    pub database_path: PathBuf,

    /// Entries returned by `GET /history`, at most 100
    pub history_limit: usize,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("attack_type_model.json"),
            database_path: PathBuf::from("prediction_history.db"),
            history_limit: DEFAULT_HISTORY_LIMIT,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            history_limit: lookup("HISTORY_LIMIT")
                .and_then(|l| l.parse::<usize>().ok())
                .map(|l| l.clamp(1, DEFAULT_HISTORY_LIMIT))
                .unwrap_or(defaults.history_limit),

            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.database_path, PathBuf::from("prediction_history.db"));
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = config_with(&[
            ("PORT", "not-a-port"),
            ("HISTORY_LIMIT", "50000"),
            ("MODEL_PATH", "/models/attack.onnx"),
            ("ENVIRONMENT", "production"),
        ]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.model_path, PathBuf::from("/models/attack.onnx"));
        assert!(config.is_production());
    }

    #[test]
    fn test_history_limit_can_only_shrink() {
        assert_eq!(config_with(&[("HISTORY_LIMIT", "25")]).history_limit, 25);
        assert_eq!(config_with(&[("HISTORY_LIMIT", "0")]).history_limit, 1);
        assert_eq!(config_with(&[("HISTORY_LIMIT", "1000")]).history_limit, 100);
    }
}
