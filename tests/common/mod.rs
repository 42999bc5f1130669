//! Common test utilities and helpers

#![allow(dead_code)]

use axum::{http::StatusCode, routing::post, Json, Router};
use feedback_core::{
    api, config::SentimentConfig, ConnectionMode, FeedbackService, LibsqlStore,
    RemoteSentimentClient,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Text the stub sentiment service refuses to score
pub const FAILING_TEXT: &str = "please fail";

/// Score the stub sentiment service returns
pub const STUB_SCORE: f64 = 0.9;

/// A running feedback API backed by a temporary store
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<LibsqlStore>,
    _dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Bind `router` on an ephemeral port and return its base URL
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Sentiment stub: scores any text with [`STUB_SCORE`] except [`FAILING_TEXT`]
pub async fn spawn_sentiment_stub() -> String {
    let router = Router::new().route(
        "/analyze",
        post(|Json(body): Json<Value>| async move {
            if body["text"] == FAILING_TEXT {
                return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})));
            }
            (StatusCode::OK, Json(json!({ "score": STUB_SCORE })))
        }),
    );
    spawn_router(router).await
}

/// Start the feedback API against a fresh store and the sentiment stub
pub async fn spawn_app() -> TestApp {
    let sentiment_url = spawn_sentiment_stub().await;
    spawn_app_with_sentiment(sentiment_url).await
}

/// Start the feedback API against a fresh store and the given sentiment URL
pub async fn spawn_app_with_sentiment(sentiment_url: String) -> TestApp {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feedback.db");
    let store = Arc::new(
        LibsqlStore::connect(
            ConnectionMode::Local(path.to_string_lossy().to_string()),
            "feedback_feedbacks".to_string(),
            true,
        )
        .await
        .expect("Failed to create test store"),
    );

    let sentiment = RemoteSentimentClient::new(&SentimentConfig {
        base_url: sentiment_url,
        timeout_secs: 5,
    })
    .unwrap();

    let service = FeedbackService::new(store.clone(), Arc::new(sentiment));
    let base_url = spawn_router(api::router(service)).await;

    TestApp {
        base_url,
        client: reqwest::Client::new(),
        store,
        _dir: dir,
    }
}
