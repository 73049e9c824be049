//! reqwest implementation of the Street View endpoints.

use std::time::Duration;

use async_trait::async_trait;
use loci_core::{Coordinates, Error, Heading, Result, StreetViewConfig, ViewType};
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::types::{MetadataResponse, PanoramaMetadata};
use crate::StreetViewApi;

/// Street View client bound to one configuration.
#[derive(Debug, Clone)]
pub struct StreetViewClient {
    client: Client,
    config: StreetViewConfig,
}

impl StreetViewClient {
    pub fn new(config: StreetViewConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("loci/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn metadata_params(&self, target: Coordinates, view_type: ViewType) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("location", target.to_string()),
            ("key", self.config.api_key.clone()),
        ];
        if let Some(source) = view_type.metadata_source() {
            params.push(("source", source.to_string()));
        }
        params
    }

    fn image_params(&self, pano_id: &str, heading: Heading) -> Vec<(&'static str, String)> {
        vec![
            ("size", self.config.image_size.clone()),
            ("pano", pano_id.to_string()),
            ("heading", heading.to_string()),
            ("pitch", self.config.pitch.to_string()),
            ("key", self.config.api_key.clone()),
        ]
    }

    async fn get(&self, url: &str, params: &[(&'static str, String)]) -> Result<reqwest::Response> {
        // without_url keeps the key (a query parameter) out of error messages
        self.client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url().to_string()))
    }
}

#[async_trait]
impl StreetViewApi for StreetViewClient {
    async fn metadata(&self, target: Coordinates, view_type: ViewType) -> Result<PanoramaMetadata> {
        debug!("Metadata lookup at {} ({})", target, view_type);
        let params = self.metadata_params(target, view_type);
        let response = self.get(&self.config.metadata_url, &params).await?;

        let status = response.status();
        if !status.is_success() {
            error!("Error fetching metadata: {}", status.as_u16());
            return Err(Error::Status {
                endpoint: "metadata".to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.without_url().to_string()))?;
        let parsed: MetadataResponse = serde_json::from_slice(&body)?;
        if !parsed.is_ok() {
            warn!("No Street View available for location: {}", target);
        }
        parsed.into_panorama(target)
    }

    async fn image(&self, pano_id: &str, heading: Heading) -> Result<Vec<u8>> {
        debug!("Image fetch for panorama {} at heading {}", pano_id, heading);
        let params = self.image_params(pano_id, heading);
        let response = self.get(&self.config.image_url, &params).await?;

        let status = response.status();
        if !status.is_success() {
            error!("Error fetching image for panorama {}: {}", pano_id, status.as_u16());
            return Err(Error::Status {
                endpoint: "image".to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.without_url().to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use parking_lot::Mutex;

    type Params = HashMap<String, String>;

    #[derive(Default)]
    struct Stub {
        metadata_calls: Mutex<Vec<Params>>,
        image_calls: Mutex<Vec<Params>>,
    }

    async fn stub_metadata(State(stub): State<Arc<Stub>>, Query(params): Query<Params>) -> impl IntoResponse {
        stub.metadata_calls.lock().push(params.clone());
        let location = params.get("location").cloned().unwrap_or_default();
        match location.as_str() {
            "0,0" => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "OK",
                    "pano_id": "pano-a",
                    "location": { "lat": 0.0001, "lng": 0.0 }
                })),
            )
                .into_response(),
            "1,1" => (StatusCode::OK, Json(serde_json::json!({ "status": "ZERO_RESULTS" }))).into_response(),
            "2,2" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            "4,4" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                StatusCode::OK.into_response()
            }
            _ => (StatusCode::OK, "not json").into_response(),
        }
    }

    async fn stub_image(State(stub): State<Arc<Stub>>, Query(params): Query<Params>) -> impl IntoResponse {
        stub.image_calls.lock().push(params.clone());
        if params.get("pano").map(String::as_str) == Some("forbidden") {
            return StatusCode::FORBIDDEN.into_response();
        }
        ([("content-type", "image/jpeg")], b"\xFF\xD8jpeg-bytes".to_vec()).into_response()
    }

    async fn spawn_stub() -> (Arc<Stub>, String) {
        let stub = Arc::new(Stub::default());
        let app = Router::new()
            .route("/metadata", get(stub_metadata))
            .route("/image", get(stub_image))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (stub, format!("http://{addr}"))
    }

    fn client_for(base: &str) -> StreetViewClient {
        let mut config = StreetViewConfig::new("test-key");
        config.metadata_url = format!("{base}/metadata");
        config.image_url = format!("{base}/image");
        config.timeout_secs = Some(1);
        StreetViewClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_ok() {
        let (stub, base) = spawn_stub().await;
        let client = client_for(&base);

        let pano = client
            .metadata(Coordinates::new(0.0, 0.0), ViewType::RoadView)
            .await
            .unwrap();
        assert_eq!(pano.pano_id, "pano-a");
        assert_eq!(pano.location, Some(Coordinates::new(0.0001, 0.0)));

        let calls = stub.metadata_calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get("location").unwrap(), "0,0");
        assert_eq!(calls[0].get("key").unwrap(), "test-key");
        assert!(!calls[0].contains_key("source"));
    }

    #[tokio::test]
    async fn test_footpath_requests_outdoor_source() {
        let (stub, base) = spawn_stub().await;
        let client = client_for(&base);

        client
            .metadata(Coordinates::new(0.0, 0.0), ViewType::FootpathView)
            .await
            .unwrap();
        assert_eq!(stub.metadata_calls.lock()[0].get("source").unwrap(), "outdoor");
    }

    #[tokio::test]
    async fn test_metadata_failures() {
        let (_stub, base) = spawn_stub().await;
        let client = client_for(&base);

        let err = client
            .metadata(Coordinates::new(1.0, 1.0), ViewType::RoadView)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCoverage { .. }));

        let err = client
            .metadata(Coordinates::new(2.0, 2.0), ViewType::RoadView)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status { status: 500, .. }));

        let err = client
            .metadata(Coordinates::new(3.0, 3.0), ViewType::RoadView)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_metadata_timeout_is_transport_error() {
        let (_stub, base) = spawn_stub().await;
        let client = client_for(&base);

        let err = client
            .metadata(Coordinates::new(4.0, 4.0), ViewType::RoadView)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(!err.to_string().contains("test-key"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}"));
        let err = client
            .metadata(Coordinates::new(0.0, 0.0), ViewType::RoadView)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn test_image_params_and_bytes() {
        let (stub, base) = spawn_stub().await;
        let client = client_for(&base);

        let bytes = client.image("pano-a", Heading::Degrees(90.0)).await.unwrap();
        assert_eq!(bytes, b"\xFF\xD8jpeg-bytes");

        client.image("pano-a", Heading::Fallback).await.unwrap();

        let calls = stub.image_calls.lock();
        assert_eq!(calls[0].get("size").unwrap(), "640x640");
        assert_eq!(calls[0].get("pano").unwrap(), "pano-a");
        assert_eq!(calls[0].get("heading").unwrap(), "90");
        assert_eq!(calls[0].get("pitch").unwrap(), "0");
        assert_eq!(calls[0].get("key").unwrap(), "test-key");
        assert_eq!(calls[1].get("heading").unwrap(), "0");
    }

    #[tokio::test]
    async fn test_image_error_status() {
        let (_stub, base) = spawn_stub().await;
        let client = client_for(&base);

        let err = client.image("forbidden", Heading::Fallback).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 403, .. }));
    }
}
