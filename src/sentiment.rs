//! Remote sentiment scoring
//!
//! The sentiment service exposes `POST {base_url}/analyze` taking
//! `{"text": ...}` and answering `{"score": <number>}`. Every way that call
//! can go wrong collapses into [`FeedbackError::AnalysisUnavailable`].

use crate::config::SentimentConfig;
use crate::error::{FeedbackError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Scores text on behalf of the feedback service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentService: Send + Sync {
    /// Score one text
    async fn score(&self, text: &str) -> Result<f64>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    score: f64,
}

/// HTTP client for the sentiment service
pub struct RemoteSentimentClient {
    client: Client,
    endpoint: String,
}

impl RemoteSentimentClient {
    /// Build a client with the configured timeout
    pub fn new(config: &SentimentConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(FeedbackError::Validation(
                "sentiment base URL cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedbackError::AnalysisUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/analyze", config.base_url.trim_end_matches('/')),
        })
    }

    /// Full URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SentimentService for RemoteSentimentClient {
    async fn score(&self, text: &str) -> Result<f64> {
        debug!("Requesting sentiment score ({} chars)", text.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { text })
            .send()
            .await
            .map_err(|e| FeedbackError::AnalysisUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedbackError::AnalysisUnavailable(format!(
                "sentiment service returned {}",
                status
            )));
        }

        let body = response
            .json::<AnalyzeResponse>()
            .await
            .map_err(|e| FeedbackError::AnalysisUnavailable(format!("undecodable response: {}", e)))?;

        debug!("Sentiment score: {}", body.score);
        Ok(body.score)
    }
}
