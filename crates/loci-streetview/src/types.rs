//! Metadata endpoint payloads.

use loci_core::{Coordinates, Error, Result};
use serde::{Deserialize, Serialize};

pub const STATUS_OK: &str = "OK";

/// Raw metadata response body.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    pub status: String,
    #[serde(default)]
    pub pano_id: Option<String>,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// `location` object; either half may be missing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// A panorama found for a query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanoramaMetadata {
    pub pano_id: String,
    /// The panorama's own position. `None` when the response omitted it.
    pub location: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl MetadataResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Convert into panorama metadata, or `NoCoverage` for a non-OK status.
    pub fn into_panorama(self, target: Coordinates) -> Result<PanoramaMetadata> {
        if !self.is_ok() {
            let status = match self.error_message {
                Some(msg) => format!("{}: {}", self.status, msg),
                None => self.status,
            };
            return Err(Error::NoCoverage {
                location: target.to_string(),
                status,
            });
        }

        let Some(pano_id) = self.pano_id.filter(|id| !id.is_empty()) else {
            return Err(Error::NoCoverage {
                location: target.to_string(),
                status: "OK without pano_id".to_string(),
            });
        };

        let location = self.location.and_then(|loc| match (loc.lat, loc.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(Coordinates::new(lat, lng))
            }
            _ => None,
        });

        Ok(PanoramaMetadata {
            pano_id,
            location,
            date: self.date,
            copyright: self.copyright,
        })
    }
}
