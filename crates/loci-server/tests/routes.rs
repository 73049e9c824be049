//! Route tests: drive the router in-process with a scripted Street View API.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use loci_core::{Coordinates, DataPaths, Error, Heading, Result, ViewType};
use loci_server::{build_router, AppState};
use loci_streetview::{PanoramaMetadata, StreetViewApi};
use tower::ServiceExt;

const BOUNDARY: &str = "loci-test-boundary";

/// "0,0" has a panorama, "1,1" has no coverage, everything else times out.
struct FakeApi;

#[async_trait]
impl StreetViewApi for FakeApi {
    async fn metadata(&self, target: Coordinates, _view_type: ViewType) -> Result<PanoramaMetadata> {
        match target.to_string().as_str() {
            "0,0" => Ok(PanoramaMetadata {
                pano_id: "pano-a".to_string(),
                location: Some(Coordinates::new(0.0, -0.001)),
                date: None,
                copyright: None,
            }),
            "1,1" => Err(Error::NoCoverage {
                location: "1,1".to_string(),
                status: "ZERO_RESULTS".to_string(),
            }),
            _ => Err(Error::Http("operation timed out".to_string())),
        }
    }

    async fn image(&self, pano_id: &str, _heading: Heading) -> Result<Vec<u8>> {
        Ok(format!("jpeg:{pano_id}").into_bytes())
    }
}

fn app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path()).unwrap();
    let state = Arc::new(AppState::new(paths, Arc::new(FakeApi)));
    (build_router(state), dir)
}

fn upload(csv: &str, view_type: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"sites.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n"
    ));
    if let Some(v) = view_type {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"view_type\"\r\n\r\n{v}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::post("/api/runs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

async fn wait_finished(app: &Router, run_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (status, run) = get_json(app, &format!("/api/runs/{run_id}")).await;
        assert_eq!(status, StatusCode::OK);
        if run["status"] != "running" {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not finish");
}

#[tokio::test]
async fn test_missing_columns_rejected_without_starting_a_run() {
    let (app, _dir) = app();

    let (status, body) = send(&app, upload("lat,lon\n1,2\n", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["error"],
        "CSV must contain 'latitude' and 'longitude' columns."
    );

    let (_, runs) = get_json(&app, "/api/runs").await;
    assert_eq!(runs["total"], 0);
}

#[tokio::test]
async fn test_invalid_view_type_rejected() {
    let (app, _dir) = app();
    let (status, _) = send(&app, upload("latitude,longitude\n0,0\n", Some("XX"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_three_row_run_end_to_end() {
    let (app, _dir) = app();

    let (status, body) = send(&app, upload("latitude,longitude\n0,0\n1,1\n2,2\n", Some("RV"))).await;
    assert_eq!(status, StatusCode::OK);
    let started: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(started["total"], 3);
    let run_id = started["runId"].as_str().unwrap().to_string();

    let run = wait_finished(&app, &run_id).await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["processed"], 3);
    assert_eq!(run["progress"], 1.0);

    let images = run["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["name"], "location_1");

    let texts: Vec<&str> = run["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["text"].as_str())
        .collect();
    assert!(texts.iter().any(|t| t.starts_with("Skipping location_2")));
    assert!(texts.iter().any(|t| t.starts_with("Skipping location_3")));

    // Image route
    let url = images[0]["url"].as_str().unwrap();
    let (status, bytes) = send(&app, Request::get(url).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"jpeg:pano-a");

    // Archive holds exactly the downloaded image
    let (status, bytes) = send(
        &app,
        Request::get(format!("/api/runs/{run_id}/archive"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    let mut buf = Vec::new();
    archive
        .by_name("location_1.jpg")
        .unwrap()
        .read_to_end(&mut buf)
        .unwrap();
    assert_eq!(buf, b"jpeg:pano-a");
}

#[tokio::test]
async fn test_empty_run_has_no_archive() {
    let (app, _dir) = app();

    let (_, body) = send(&app, upload("latitude,longitude\n1,1\n", None)).await;
    let started: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let run_id = started["runId"].as_str().unwrap().to_string();

    let run = wait_finished(&app, &run_id).await;
    assert_eq!(run["images"].as_array().unwrap().len(), 0);
    assert!(run["archiveUrl"].is_null());
    assert!(run["messages"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["text"] == "No images were downloaded."));

    let (status, body) = get_json(&app, &format!("/api/runs/{run_id}/archive")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No images were downloaded.");
}

#[tokio::test]
async fn test_unknown_run_and_image() {
    let (app, _dir) = app();

    let (status, _) = get_json(&app, "/api/runs/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/api/runs/nope/images/location_1.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_and_health() {
    let (app, _dir) = app();

    let (status, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body)
        .unwrap()
        .contains("Loci - Your Ultimate Street View Inspection Site Downloader"));

    let (status, health) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");

    // No banner file in a fresh data dir
    let (status, _) = send(&app, Request::get("/api/banner").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finished_runs_are_evicted_beyond_retention() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path()).unwrap();
    let runs_dir = paths.runs.clone();
    let state = Arc::new(AppState::new(paths, Arc::new(FakeApi)).with_max_retained_runs(3));
    let app = build_router(state.clone());

    let mut last_run = String::new();
    for _ in 0..8 {
        let (status, body) = send(&app, upload("latitude,longitude\n0,0\n", None)).await;
        assert_eq!(status, StatusCode::OK);
        let started: serde_json::Value = serde_json::from_slice(&body).unwrap();
        last_run = started["runId"].as_str().unwrap().to_string();
        wait_finished(&app, &last_run).await;
    }

    assert_eq!(state.runs.read().len(), 3);
    assert_eq!(std::fs::read_dir(&runs_dir).unwrap().count(), 3);

    let (status, run) = get_json(&app, &format!("/api/runs/{last_run}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_truncated_view_type_field_rejected() {
    let (app, _dir) = app();

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"sites.csv\"\r\n\r\nlatitude,longitude\n0,0\n\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"view_type\"\r\n\r\nFV"
    );
    let req = Request::post("/api/runs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, runs) = get_json(&app, "/api/runs").await;
    assert_eq!(runs["total"], 0);
}
