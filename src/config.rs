//! Configuration for the feedback service
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. `FEEDBACK_*` environment variables, `__` separating sections
//!    (e.g. `FEEDBACK_STORE__URL`, `FEEDBACK_SENTIMENT__BASE_URL`)
//!
//! `API_URL_SENTIMENT` is honored for the sentiment base URL when no
//! `FEEDBACK_SENTIMENT__BASE_URL` is set.

use crate::error::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment prefix for all settings
const ENV_PREFIX: &str = "FEEDBACK";

/// Legacy variable naming the sentiment service base URL
const LEGACY_SENTIMENT_URL_VAR: &str = "API_URL_SENTIMENT";

/// Default outbound timeout for the sentiment call
const DEFAULT_SENTIMENT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub sentiment: SentimentConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string: a local file path or a `libsql://` URL
    pub url: String,
    /// Auth token for remote databases (falls back to `TURSO_AUTH_TOKEN`)
    pub auth_token: Option<String>,
    /// Logical database name
    pub database: String,
    /// Collection name within the database
    pub collection: String,
    /// Enforce uniqueness of the application `id` field
    pub unique_app_id: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_db_path().to_string_lossy().to_string(),
            auth_token: None,
            database: "feedback".to_string(),
            collection: "feedbacks".to_string(),
            unique_app_id: true,
        }
    }
}

impl StoreConfig {
    /// Backing table for the collection, namespaced by database
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.database, self.collection)
    }
}

/// Sentiment service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Base URL; requests go to `{base_url}/analyze`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: DEFAULT_SENTIMENT_TIMEOUT_SECS,
        }
    }
}

/// Default database path under the platform data directory
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedback")
        .join("feedback.db")
}

impl FeedbackConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: FeedbackConfig = builder.build()?.try_deserialize()?;

        let explicit_url = env::var(format!("{}_SENTIMENT__BASE_URL", ENV_PREFIX)).is_ok();
        if !explicit_url {
            if let Ok(url) = env::var(LEGACY_SENTIMENT_URL_VAR) {
                if !url.is_empty() {
                    debug!("Using sentiment URL from {}", LEGACY_SENTIMENT_URL_VAR);
                    loaded.sentiment.base_url = url;
                }
            }
        }

        Ok(loaded)
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.store.url.is_empty() {
            return Err(invalid("store.url must not be empty"));
        }
        if self.store.url == ":memory:" {
            return Err(invalid(
                "store.url ':memory:' is not supported; each connection would see its own database",
            ));
        }
        for (key, value) in [
            ("store.database", &self.store.database),
            ("store.collection", &self.store.collection),
        ] {
            if !is_identifier(value) {
                return Err(invalid(&format!(
                    "{} must be non-empty and contain only letters, digits or '_', got '{}'",
                    key, value
                )));
            }
        }
        if self.sentiment.base_url.is_empty() {
            return Err(invalid("sentiment.base_url must not be empty"));
        }
        if self.sentiment.timeout_secs == 0 {
            return Err(invalid("sentiment.timeout_secs must be greater than zero"));
        }
        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid(message: &str) -> FeedbackError {
    FeedbackError::Config(config::ConfigError::Message(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for var in [
            "FEEDBACK_STORE__URL",
            "FEEDBACK_STORE__COLLECTION",
            "FEEDBACK_SENTIMENT__BASE_URL",
            "FEEDBACK_SENTIMENT__TIMEOUT_SECS",
            LEGACY_SENTIMENT_URL_VAR,
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = FeedbackConfig::load(None).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.store.table_name(), "feedback_feedbacks");
        assert_eq!(config.sentiment.timeout_secs, DEFAULT_SENTIMENT_TIMEOUT_SECS);
        assert!(config.store.unique_app_id);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("FEEDBACK_STORE__COLLECTION", "reviews");
        env::set_var("FEEDBACK_SENTIMENT__TIMEOUT_SECS", "5");

        let config = FeedbackConfig::load(None).unwrap();
        assert_eq!(config.store.collection, "reviews");
        assert_eq!(config.sentiment.timeout_secs, 5);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_legacy_sentiment_url() {
        clear_env();
        env::set_var(LEGACY_SENTIMENT_URL_VAR, "http://sentiment.local");
        let config = FeedbackConfig::load(None).unwrap();
        assert_eq!(config.sentiment.base_url, "http://sentiment.local");

        // The prefixed variable wins
        env::set_var("FEEDBACK_SENTIMENT__BASE_URL", "http://preferred.local");
        let config = FeedbackConfig::load(None).unwrap();
        assert_eq!(config.sentiment.base_url, "http://preferred.local");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_file_source() {
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[store]\nurl = \"/tmp/fb.db\"\ndatabase = \"cicd\"\n\n[server]\naddr = \"127.0.0.1:9000\""
        )
        .unwrap();

        let config = FeedbackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.store.url, "/tmp/fb.db");
        assert_eq!(config.store.table_name(), "cicd_feedbacks");
        assert_eq!(config.server.addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut config = FeedbackConfig::default();
        config.store.collection = "feed-backs".to_string();
        assert!(config.validate().is_err());

        let mut config = FeedbackConfig::default();
        config.store.url = ":memory:".to_string();
        assert!(config.validate().is_err());

        let mut config = FeedbackConfig::default();
        config.sentiment.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
