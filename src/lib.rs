//! Feedback service - feedback records with delegated sentiment scoring
//!
//! Feedback records are free-form JSON documents kept in a libSQL-backed
//! collection. The service lists, creates, updates, deletes and bulk-loads
//! them, asks a remote sentiment service to score their text, and aggregates
//! the average score.
//!
//! # Architecture
//!
//! - **Types**: documents, identities and operation outcomes
//! - **Storage**: the [`DocumentStore`] contract and its libSQL implementation
//! - **Sentiment**: HTTP client for the scoring service
//! - **Service**: lifecycle rules over store and client
//! - **API**: axum router mapping HTTP requests to service calls
//!
//! # Example
//!
//! ```ignore
//! use feedback_core::{FeedbackConfig, FeedbackService, LibsqlStore, RemoteSentimentClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FeedbackConfig::load(None)?;
//!     let store = LibsqlStore::open(&config.store).await?;
//!     let sentiment = RemoteSentimentClient::new(&config.sentiment)?;
//!     let service = FeedbackService::new(Arc::new(store), Arc::new(sentiment));
//!
//!     let report = service.analyze_all().await?;
//!     println!("{} feedbacks scored", report.updated_count);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod sentiment;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig};
pub use config::FeedbackConfig;
pub use error::{FeedbackError, Result};
pub use sentiment::{RemoteSentimentClient, SentimentService};
pub use service::FeedbackService;
pub use storage::{ConnectionMode, DocumentStore, LibsqlStore};
pub use types::{
    AnalysisResult, AnalyzeAllReport, AverageScore, Document, DocumentId, UploadOutcome,
};
