//! HTTP error mapping
//!
//! Every failure leaves the API as `{"error": "<short message>"}`. Store and
//! client details are logged here and never sent to the caller.

use crate::error::FeedbackError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or identity (400)
    BadRequest(String),
    /// No matching feedback (404)
    NotFound(String),
    /// Store, sentiment service or decode failure (500)
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg) => msg,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation(msg) => ApiError::BadRequest(msg),
            FeedbackError::InvalidIdentity(msg) => {
                warn!("Rejected identity: {}", msg);
                ApiError::BadRequest("Invalid ID".to_string())
            }
            FeedbackError::NotFound(msg) => {
                warn!("Not found: {}", msg);
                ApiError::NotFound("Feedback not found".to_string())
            }
            // Only upload tolerates duplicates; anywhere else the write failed
            FeedbackError::DuplicateKey(msg) => {
                error!("Write rejected by uniqueness constraint: {}", msg);
                ApiError::Internal("Database error".to_string())
            }
            FeedbackError::AnalysisUnavailable(msg) => {
                error!("Sentiment analysis failed: {}", msg);
                ApiError::Internal("Sentiment analysis failed".to_string())
            }
            FeedbackError::StoreUnavailable(msg) => {
                error!("Store error: {}", msg);
                ApiError::Internal("Database error".to_string())
            }
            FeedbackError::Decode(msg) => {
                error!("Decode error: {}", msg);
                ApiError::Internal("Failed to decode stored feedback".to_string())
            }
            other => {
                error!("Internal error: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}
