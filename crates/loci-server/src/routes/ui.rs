//! Page, banner and health routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use crate::state::{AppState, RunStatus};

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/banner", get(banner))
        .route("/health", get(health))
}

/// GET /: the single-page UI.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/banner: optional header image from the data directory.
async fn banner(State(state): State<Arc<AppState>>) -> Response {
    let path = &state.data_paths.banner;
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => {
            debug!("No banner at {}: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let runs = state.runs.read();
    let running = runs
        .values()
        .filter(|r| r.status == RunStatus::Running)
        .count();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "runs": runs.len(),
        "running": running,
    }))
}
