// 🌐 HTTP glue - one search route per index over the Query Service
//
// Each request opens its own read-only connection on the blocking pool, so
// handlers share nothing but the database path.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::QueryError;
use crate::query::{search, SearchRequest, SearchResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        AppState {
            db_path: Arc::new(db_path.into()),
        }
    }
}

/// API Response wrapper; a successful body is flattened next to `success`.
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match &self {
            QueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QueryError::UnknownIndex(_) => StatusCode::NOT_FOUND,
            QueryError::Index(_) | QueryError::CorruptDocument { .. } => {
                error!(error = %self, "search failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        failure(status, self.to_string())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true, "status": "OK" }))
}

/// GET /api/search/:index
async fn search_index(
    State(state): State<AppState>,
    Path(index): Path<String>,
    request: Result<Query<SearchRequest>, QueryRejection>,
) -> Response {
    let Query(request) = match request {
        Ok(query) => query,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let db_path = state.db_path.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<SearchResponse, QueryError> {
        let conn = Connection::open_with_flags(
            db_path.as_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        search(&conn, &index, &request)
    })
    .await;

    match result {
        Ok(Ok(response)) => (StatusCode::OK, Json(ApiResponse::ok(response))).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(error = %e, "search task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "search task failed")
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/search/:index", get(search_index))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
