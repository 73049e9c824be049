//! Run routes: upload a table, follow progress, fetch images and the zip bundle.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use loci_batch::{build_archive, CsvRowSource, RowSource, ARCHIVE_FILE_NAME};
use loci_core::{Error, ViewType};
use tracing::{debug, error, info, warn};

use crate::state::{AppState, RunRecord, RunStatus};
use crate::worker;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/runs",
            post(start_run)
                .get(list_runs)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/runs/{run_id}", get(get_run))
        .route("/runs/{run_id}/images/{name}", get(get_image))
        .route("/runs/{run_id}/archive", get(get_archive))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn run_json(record: &RunRecord) -> serde_json::Value {
    let images: Vec<serde_json::Value> = record
        .images
        .iter()
        .map(|img| {
            serde_json::json!({
                "name": img.name,
                "fileName": img.file_name(),
                "url": format!("/api/runs/{}/images/{}", record.id, img.file_name()),
                "panoId": img.pano_id,
                "heading": img.heading,
                "fallbackHeading": img.fallback_heading,
            })
        })
        .collect();

    let archive_url = (record.status == RunStatus::Completed && !record.images.is_empty())
        .then(|| format!("/api/runs/{}/archive", record.id));

    serde_json::json!({
        "id": record.id,
        "filename": record.filename,
        "viewType": record.view_type,
        "status": record.status,
        "total": record.total,
        "processed": record.processed,
        "progress": record.progress(),
        "images": images,
        "messages": record.messages,
        "archiveUrl": archive_url,
        "error": record.error,
        "startedAt": record.started_at,
        "completedAt": record.completed_at,
    })
}

/// POST /api/runs: upload a CSV (multipart `file`, optional `view_type`) and start a run.
async fn start_run(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut view_type = ViewType::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid upload: {e}")),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.csv").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, format!("Read failed: {e}"));
                    }
                }
            }
            Some("view_type") => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Read failed: {e}"),
                        );
                    }
                };
                if raw.trim().is_empty() {
                    continue;
                }
                match ViewType::from_code(&raw) {
                    Some(v) => view_type = v,
                    None => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Invalid view type '{raw}', expected RV or FV"),
                        );
                    }
                }
            }
            _ => continue,
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "Please upload a CSV file.");
    };

    let source = match CsvRowSource::from_reader(bytes.as_slice()) {
        Ok(source) => source,
        Err(e @ Error::MissingColumns(_)) => {
            warn!("Rejected upload {}: {}", filename, e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let total = source.total();
    let record = RunRecord::new(
        run_id.clone(),
        filename.clone(),
        view_type,
        total,
        state.data_paths.run_dir(&run_id),
    );
    for dir in state.register_run(record) {
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Evicted run directory {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
        }
    }
    info!("Queued run {} for {} ({} rows)", run_id, filename, total);

    worker::start_run(state.clone(), run_id.clone(), source, view_type);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "runId": run_id,
            "total": total,
            "viewType": view_type,
        })),
    )
        .into_response()
}

/// GET /api/runs: all runs, newest first.
async fn list_runs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let runs = state.runs.read();
    let mut records: Vec<&RunRecord> = runs.values().collect();
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let runs_json: Vec<serde_json::Value> = records.into_iter().map(run_json).collect();
    Json(serde_json::json!({
        "total": runs_json.len(),
        "runs": runs_json,
    }))
}

/// GET /api/runs/:run_id: status, progress, images and messages.
async fn get_run(State(state): State<Arc<AppState>>, Path(run_id): Path<String>) -> Response {
    match state.get_run(&run_id) {
        Some(record) => Json(run_json(&record)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Run not found"),
    }
}

/// GET /api/runs/:run_id/images/:name: one downloaded JPEG.
async fn get_image(
    State(state): State<Arc<AppState>>,
    Path((run_id, name)): Path<(String, String)>,
) -> Response {
    // Only names the run itself produced are served
    let path = match state.get_run(&run_id) {
        Some(record) => match record.image(&name) {
            Some(image) => image.path.clone(),
            None => return error_response(StatusCode::NOT_FOUND, "Image not found"),
        },
        None => return error_response(StatusCode::NOT_FOUND, "Run not found"),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            error_response(StatusCode::NOT_FOUND, "Image not found")
        }
    }
}

/// GET /api/runs/:run_id/archive: `downloaded_images.zip`.
async fn get_archive(State(state): State<Arc<AppState>>, Path(run_id): Path<String>) -> Response {
    let Some(record) = state.get_run(&run_id) else {
        return error_response(StatusCode::NOT_FOUND, "Run not found");
    };
    if record.status == RunStatus::Running {
        return error_response(StatusCode::CONFLICT, "Run still in progress");
    }
    if record.images.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "No images were downloaded.");
    }

    let images = record.images;
    let archive = tokio::task::spawn_blocking(move || build_archive(&images)).await;
    match archive {
        Ok(Ok(bytes)) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{ARCHIVE_FILE_NAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!("Failed to build archive for run {}: {}", run_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
