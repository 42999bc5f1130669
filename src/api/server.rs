//! HTTP API server

use super::error::ApiError;
use crate::service::FeedbackService;
use crate::types::{Document, UploadOutcome};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::{future::Future, net::SocketAddr};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Plain-text banner served on `/`
pub const BANNER: &str = "Feedback management API";

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([0, 0, 0, 0], 8080).into(),
        }
    }
}

/// API server state
#[derive(Clone)]
struct AppState {
    service: FeedbackService,
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    service: FeedbackService,
}

/// Build the feedback router
///
/// Each route carries a method fallback so a known path hit with the wrong
/// method still answers with a JSON error body.
pub fn router(service: FeedbackService) -> Router {
    Router::new()
        .route("/", get(root_handler).fallback(method_not_allowed_handler))
        .route("/health", get(health_handler).fallback(method_not_allowed_handler))
        .route(
            "/feedbacks",
            get(list_handler)
                .post(create_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/feedbacks/upload",
            post(upload_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/feedbacks/analyze-all",
            post(analyze_all_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/feedbacks/average-score",
            get(average_score_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/feedbacks/:id",
            put(update_handler)
                .delete(delete_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/feedbacks/:id/analyze",
            post(analyze_handler).fallback(method_not_allowed_handler),
        )
        .fallback(not_found_handler)
        .with_state(AppState { service })
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, service: FeedbackService) -> Self {
        Self { config, service }
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router(self.service))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn root_handler() -> &'static str {
    BANNER
}

/// Health check handler
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    document_count: u64,
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let document_count = state.service.health().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        document_count,
    }))
}

async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    let docs = state.service.list().await?;
    debug!("Listing {} feedbacks", docs.len());
    Ok(Json(docs))
}

async fn create_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let doc = Document::from_slice(&body)?;
    let id = state.service.create(doc).await?;
    Ok(Json(json!({ "inserted_id": id })))
}

async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let patch = Document::from_slice(&body)?;
    let modified = state.service.update(&id, patch).await?;
    Ok(Json(json!({ "modified_count": modified })))
}

async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.service.delete(&id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Feedback not found".to_string()));
    }
    Ok(Json(json!({ "deleted_count": deleted })))
}

async fn upload_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = match state.service.bulk_upload(&body).await? {
        UploadOutcome::Batch {
            inserted_count,
            duplicate_count: 0,
        } => json!({ "inserted_count": inserted_count }),
        UploadOutcome::Batch {
            inserted_count,
            duplicate_count,
        } => json!({
            "inserted_count": inserted_count,
            "duplicate_count": duplicate_count,
            "message": "Some feedbacks already existed and were skipped",
        }),
        UploadOutcome::Single(id) => json!({ "inserted_id": id }),
        UploadOutcome::Duplicate => json!({
            "message": "Feedback already exists",
            "inserted_count": 0,
        }),
    };
    Ok(Json(body))
}

async fn analyze_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.service.analyze_one(&id).await?;
    Ok(Json(result))
}

async fn analyze_all_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.service.analyze_all().await?;
    Ok(Json(json!({
        "updated_count": report.updated_count,
        "skipped_count": report.skipped.len(),
    })))
}

async fn average_score_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let average = state.service.average_score().await?;
    Ok(Json(average))
}

async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found", "path": uri.path() })),
    )
}

async fn method_not_allowed_handler(method: Method, uri: Uri) -> impl IntoResponse {
    debug!("{} not allowed on {}", method, uri.path());
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed", "path": uri.path() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::MockSentimentService;
    use crate::storage::{ConnectionMode, LibsqlStore};
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_router() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.db");
        let store = LibsqlStore::connect(
            ConnectionMode::Local(path.to_string_lossy().to_string()),
            "feedback_feedbacks".to_string(),
            true,
        )
        .await
        .unwrap();
        let mut sentiment = MockSentimentService::new();
        sentiment.expect_score().returning(|_| Ok(0.75));

        let service = FeedbackService::new(Arc::new(store), Arc::new(sentiment));
        (router(service), dir)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        (status, value)
    }

    #[tokio::test]
    async fn test_banner() {
        let (router, _dir) = test_router().await;
        let (status, body) = send(&router, "GET", "/", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String(BANNER.to_string()));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (router, _dir) = test_router().await;
        let (status, body) = send(&router, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["document_count"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (router, _dir) = test_router().await;
        let (status, body) = send(&router, "GET", "/nope/deeper", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Route not found", "path": "/nope/deeper"}));
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let (router, _dir) = test_router().await;
        let (status, body) = send(&router, "POST", "/feedbacks", "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_update_and_delete_bad_identity() {
        let (router, _dir) = test_router().await;
        let (status, body) = send(&router, "PUT", "/feedbacks/123", r#"{"text": "x"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid ID");

        let (status, _) = send(&router, "DELETE", "/feedbacks/123", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let (router, _dir) = test_router().await;

        let (status, body) = send(&router, "POST", "/feedbacks", r#"{"text": "great"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["inserted_id"].as_str().unwrap().to_string();

        let uri = format!("/feedbacks/{}", id);
        let (status, body) = send(&router, "PUT", &uri, r#"{"id": "a1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["modified_count"], 1);

        let (status, body) = send(&router, "DELETE", &uri, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 1);

        let (status, body) = send(&router, "DELETE", &uri, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Feedback not found");

        let (status, _) = send(&router, "PUT", &uri, r#"{"id": "a1"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_duplicate_app_id_is_server_error() {
        let (router, _dir) = test_router().await;
        send(&router, "POST", "/feedbacks", r#"{"id": "dup"}"#).await;
        let (status, body) = send(&router, "POST", "/feedbacks", r#"{"id": "dup"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Database error"}));
    }

    #[tokio::test]
    async fn test_update_colliding_app_id_is_server_error() {
        let (router, _dir) = test_router().await;
        send(&router, "POST", "/feedbacks", r#"{"id": "taken"}"#).await;
        let (_, body) = send(&router, "POST", "/feedbacks", r#"{"id": "free"}"#).await;
        let uri = format!("/feedbacks/{}", body["inserted_id"].as_str().unwrap());

        let (status, body) = send(&router, "PUT", &uri, r#"{"id": "taken"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_method_on_known_path() {
        let (router, _dir) = test_router().await;
        for (method, uri) in [
            ("GET", "/feedbacks/upload"),
            ("GET", "/feedbacks/analyze-all"),
            ("DELETE", "/feedbacks/upload"),
            ("POST", "/feedbacks/average-score"),
            ("PATCH", "/feedbacks"),
        ] {
            let (status, body) = send(&router, method, uri, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
            assert_eq!(body, json!({"error": "Method not allowed", "path": uri}));
        }
    }

    #[tokio::test]
    async fn test_analyze_and_average() {
        let (router, _dir) = test_router().await;

        let (_, body) = send(&router, "GET", "/feedbacks/average-score", "").await;
        assert_eq!(body, json!({"average_score": 0.0, "scored_count": 0}));

        send(&router, "POST", "/feedbacks", r#"{"id": "a1", "text": "nice"}"#).await;
        let (status, body) = send(&router, "POST", "/feedbacks/a1/analyze", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "a1", "score": 0.75}));

        let (status, _) = send(&router, "POST", "/feedbacks/missing/analyze", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&router, "GET", "/feedbacks/average-score", "").await;
        assert_eq!(body, json!({"average_score": 0.75, "scored_count": 1}));
    }

    #[tokio::test]
    async fn test_upload_responses() {
        let (router, _dir) = test_router().await;

        let (status, body) = send(&router, "POST", "/feedbacks/upload", r#"[{"id": "x"}, {"id": "y"}]"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"inserted_count": 2}));

        let (status, body) = send(&router, "POST", "/feedbacks/upload", r#"[{"id": "y"}, {"id": "z"}]"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inserted_count"], 1);
        assert_eq!(body["duplicate_count"], 1);

        let (status, body) = send(&router, "POST", "/feedbacks/upload", r#"{"id": "z"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inserted_count"], 0);

        let (status, _) = send(&router, "POST", "/feedbacks/upload", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
