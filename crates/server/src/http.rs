use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use serde::{Deserialize, Serialize};
use spandsl::SqlOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{Result, ServerError};
use crate::metrics::{Metrics, OUTCOME_ERROR, OUTCOME_INVALID, OUTCOME_SUCCESS};

/// Shared state for all handlers
pub struct AppState {
    /// Defaults applied when a request omits `year` or `dataPath`
    pub options: SqlOptions,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(options: SqlOptions) -> Result<Self> {
        Ok(Self {
            options,
            metrics: Metrics::new()?,
        })
    }
}

/// Body of `POST /api/compile`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub query: Option<String>,
    pub year: Option<i32>,
    pub data_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CompileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompileResponse {
    pub fn success(sql: String) -> Self {
        Self {
            success: true,
            sql: Some(sql),
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            sql: None,
            error: Some(error),
        }
    }
}

/// Create the HTTP router
///
/// Unmatched paths fall through to `static_dir` when it is set.
pub fn create_router(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let mut router = Router::new()
        .route("/api/compile", routing::post(compile_handler))
        .route("/health", routing::get(health_handler))
        .route("/metrics", routing::get(metrics_handler))
        .with_state(state);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Handler for POST /api/compile
async fn compile_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CompileRequest>, JsonRejection>,
) -> Result<Json<CompileResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected compile request body");
            state.metrics.observe(OUTCOME_INVALID);
            return Err(ServerError::InvalidRequest);
        }
    };

    let query = match request.query.as_deref() {
        Some(query) if !query.trim().is_empty() => query,
        _ => {
            state.metrics.observe(OUTCOME_INVALID);
            return Err(ServerError::InvalidRequest);
        }
    };

    let mut options = state.options.clone();
    if let Some(year) = request.year {
        options.year = Some(year);
    }
    if let Some(data_path) = request.data_path {
        options.data_path = Some(data_path);
    }

    match spandsl::compile(query, &options) {
        Ok(sql) => {
            state.metrics.observe(OUTCOME_SUCCESS);
            Ok(Json(CompileResponse::success(sql)))
        }
        Err(e) => {
            tracing::info!(error = %e, kind = e.name(), "Compile failed");
            state.metrics.observe(OUTCOME_ERROR);
            Err(e.into())
        }
    }
}

/// Handler for GET /health
async fn health_handler() -> &'static str {
    "ok"
}

/// Handler for GET /metrics
/// Returns Prometheus metrics in text format
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let buffer = state.metrics.encode()?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    ))
}
