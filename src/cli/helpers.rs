//! Shared setup for CLI commands

use anyhow::Context;
use feedback_core::{FeedbackConfig, FeedbackService, LibsqlStore, RemoteSentimentClient};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Command-line values that take precedence over file and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub addr: Option<String>,
    pub database_url: Option<String>,
    pub sentiment_url: Option<String>,
}

/// Load layered configuration, apply CLI overrides and validate
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<FeedbackConfig> {
    let mut config = FeedbackConfig::load(path).context("Failed to load configuration")?;

    if let Some(addr) = overrides.addr {
        config.server.addr = addr;
    }
    if let Some(url) = overrides.database_url {
        config.store.url = url;
    }
    if let Some(url) = overrides.sentiment_url {
        config.sentiment.base_url = url;
    }

    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", redacted(&config));
    Ok(config)
}

fn redacted(config: &FeedbackConfig) -> FeedbackConfig {
    let mut copy = config.clone();
    if copy.store.auth_token.is_some() {
        copy.store.auth_token = Some("***".to_string());
    }
    copy
}

/// Open the store and build the service
///
/// Failing to reach the store here is fatal for every command.
pub async fn open_service(config: &FeedbackConfig) -> anyhow::Result<FeedbackService> {
    let store = LibsqlStore::open(&config.store)
        .await
        .with_context(|| format!("Failed to open document store at {}", config.store.url))?;
    let sentiment =
        RemoteSentimentClient::new(&config.sentiment).context("Failed to build sentiment client")?;

    Ok(FeedbackService::new(Arc::new(store), Arc::new(sentiment)))
}
