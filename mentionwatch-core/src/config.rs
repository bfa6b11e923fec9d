//! TOML configuration for the monitor.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working keyword-classifier setup backed by a JSON store.

use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub tracking: TrackingConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub service: ServiceConfig,
    pub lexicon: LexiconConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    /// Items requested per page (Reddit caps this at 100).
    pub search_limit: u32,
    pub max_pages: u32,
    /// Reddit `t` parameter: hour, day, week, month, year or all.
    pub time_window: String,
    pub search_comments: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("mentionwatch/{}", env!("CARGO_PKG_VERSION")),
            search_limit: 100,
            max_pages: 3,
            time_window: "day".to_string(),
            search_comments: true,
            requests_per_minute: 10,
            burst: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Terms reported by the keyword matcher, in this order and casing.
    pub terms: Vec<String>,
    /// Explicit search query; built from `terms` when absent.
    pub query: Option<String>,
    /// Negative mentions scoring at or below this are flagged urgent on insert.
    pub urgent_threshold: u8,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            terms: vec!["LifeX".to_string(), "LifeX Research".to_string()],
            query: None,
            urgent_threshold: 15,
        }
    }
}

impl TrackingConfig {
    pub fn search_query(&self) -> String {
        match &self.query {
            Some(query) => query.clone(),
            None => self
                .terms
                .iter()
                .map(|term| format!("\"{}\"", term))
                .collect::<Vec<_>>()
                .join(" OR "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    Keyword,
    OpenAi,
    Claude,
}

/// How the keyword classifier turns its verdict into a 1-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringScheme {
    /// Per-rule arithmetic (10-5n, 90+5n, 70+8n, 30-8n, 50).
    #[default]
    Heuristic,
    /// Route `(label, confidence)` through the shared score mapper.
    Mapped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    pub scoring: ScoringScheme,
    pub model: Option<String>,
    /// Overrides the provider's default API key variable.
    pub api_key_env: Option<String>,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Keyword,
            scoring: ScoringScheme::Heuristic,
            model: None,
            api_key_env: None,
            batch_size: 5,
            batch_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl ClassifierConfig {
    pub fn api_key_var(&self) -> Option<String> {
        if let Some(var) = &self.api_key_env {
            return Some(var.clone());
        }
        match self.kind {
            ClassifierKind::Keyword => None,
            ClassifierKind::OpenAi => Some("OPENAI_API_KEY".to_string()),
            ClassifierKind::Claude => Some("ANTHROPIC_API_KEY".to_string()),
        }
    }

    /// Reads the provider key from the environment. Keyword mode needs none.
    pub fn api_key(&self) -> Result<Option<String>, ConfigError> {
        let Some(var_name) = self.api_key_var() else {
            return Ok(None);
        };
        match std::env::var(&var_name) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ConfigError::MissingEnvironmentVariable { var_name }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub json_path: PathBuf,
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            json_path: PathBuf::from("data/mentions.json"),
            database_url: "sqlite://data/mentions.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub poll_interval_minutes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 60,
        }
    }
}

/// Replacement term lists for the keyword scorer. `None` keeps the built-in list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub positive: Option<Vec<String>>,
    pub negative: Option<Vec<String>>,
    pub priority_negative: Option<Vec<String>>,
    pub priority_positive: Option<Vec<String>>,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracking.terms.iter().all(|t| t.trim().is_empty()) && self.tracking.query.is_none()
        {
            return Err(ConfigError::MissingField {
                field: "tracking.terms".to_string(),
            });
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        if self.reddit.search_limit == 0 || self.reddit.search_limit > 100 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.search_limit".to_string(),
                value: self.reddit.search_limit.to_string(),
            });
        }
        if self.reddit.requests_per_minute == 0 || self.reddit.burst == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reddit.requests_per_minute".to_string(),
                value: self.reddit.requests_per_minute.to_string(),
            });
        }
        const WINDOWS: [&str; 6] = ["hour", "day", "week", "month", "year", "all"];
        if !WINDOWS.contains(&self.reddit.time_window.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "reddit.time_window".to_string(),
                value: self.reddit.time_window.clone(),
            });
        }
        if self.classifier.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "classifier.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.service.poll_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "service.poll_interval_minutes".to_string(),
                value: "0".to_string(),
            });
        }
        if self.tracking.urgent_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                field: "tracking.urgent_threshold".to_string(),
                value: self.tracking.urgent_threshold.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.classifier.kind, ClassifierKind::Keyword);
        assert_eq!(config.classifier.scoring, ScoringScheme::Heuristic);
        assert_eq!(config.classifier.batch_size, 5);
        assert_eq!(config.classifier.batch_delay_ms, 1000);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.tracking.urgent_threshold, 15);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [tracking]
            terms = ["Acme"]

            [classifier]
            kind = "claude"
            scoring = "mapped"
            batch_size = 3
            batch_delay_ms = 500

            [storage]
            backend = "sqlite"
            database_url = "sqlite::memory:"

            [lexicon]
            priority_negative = ["scam", "fraud", "fake"]
            "#,
        )
        .unwrap();

        assert_eq!(config.tracking.terms, vec!["Acme".to_string()]);
        assert_eq!(config.classifier.kind, ClassifierKind::Claude);
        assert_eq!(config.classifier.scoring, ScoringScheme::Mapped);
        assert_eq!(config.classifier.batch_size, 3);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.lexicon.priority_negative.as_ref().unwrap().len(), 3);
        assert!(config.lexicon.positive.is_none());
    }

    #[test]
    fn test_search_query_built_from_terms() {
        let tracking = TrackingConfig::default();
        assert_eq!(tracking.search_query(), "\"LifeX\" OR \"LifeX Research\"");

        let explicit = TrackingConfig {
            query: Some("lifex".to_string()),
            ..Default::default()
        };
        assert_eq!(explicit.search_query(), "lifex");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = AppConfig::from_toml_str("[classifier]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "classifier.batch_size"
        ));

        let err = AppConfig::from_toml_str("[reddit]\ntime_window = \"decade\"\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::InvalidValue { .. })));

        let err = AppConfig::from_toml_str("[tracking]\nterms = []\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_unparseable_config_is_parse_error() {
        let err = AppConfig::from_toml_str("[classifier\nkind = ").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_api_key_variable() {
        let config = ClassifierConfig {
            kind: ClassifierKind::OpenAi,
            api_key_env: Some("MENTIONWATCH_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..Default::default()
        };
        let err = config.api_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvironmentVariable { .. }));

        let keyword = ClassifierConfig::default();
        assert_eq!(keyword.api_key().unwrap(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/mentionwatch.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::FileNotFound { .. })));
    }
}
