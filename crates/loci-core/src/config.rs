//! Configuration and data directory management.
//!
//! Everything that used to be a module-level constant (API key, endpoints,
//! image parameters) is an explicit value handed to the client at
//! construction time. The API key is only ever read from the environment.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::heading::FOOTPATH_HEADING_OFFSET_DEG;

pub const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";
pub const DEFAULT_METADATA_URL: &str = "https://maps.googleapis.com/maps/api/streetview/metadata";
pub const DEFAULT_IMAGE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";
pub const DEFAULT_IMAGE_SIZE: &str = "640x640";
pub const DEFAULT_PITCH: i32 = 0;
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_BANNER_FILE: &str = "Img1.PNG";

/// Street View endpoint and request parameters.
#[derive(Clone)]
pub struct StreetViewConfig {
    pub api_key: String,
    pub metadata_url: String,
    pub image_url: String,
    /// `WIDTHxHEIGHT`, sent verbatim as the `size` parameter.
    pub image_size: String,
    pub pitch: i32,
    /// Added to the bearing for footpath captures.
    pub footpath_offset_deg: f64,
    /// Per-request timeout. `None` keeps the HTTP client default.
    pub timeout_secs: Option<u64>,
}

impl StreetViewConfig {
    /// Default endpoints and parameters with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            pitch: DEFAULT_PITCH,
            footpath_offset_deg: FOOTPATH_HEADING_OFFSET_DEG,
            timeout_secs: None,
        }
    }

    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var(API_KEY_VAR)
            .ok_or_else(|| Error::Config(format!("{API_KEY_VAR} is not set")))?;
        let mut config = Self::new(api_key);

        if let Some(url) = var("LOCI_METADATA_URL") {
            config.metadata_url = url;
        }
        if let Some(url) = var("LOCI_IMAGE_URL") {
            config.image_url = url;
        }
        if let Some(size) = var("LOCI_IMAGE_SIZE") {
            if !is_valid_size(&size) {
                return Err(Error::Config(format!("LOCI_IMAGE_SIZE '{size}' is not WIDTHxHEIGHT")));
            }
            config.image_size = size;
        }
        if let Some(offset) = var("LOCI_FOOTPATH_OFFSET_DEG") {
            config.footpath_offset_deg = offset
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::Config(format!("LOCI_FOOTPATH_OFFSET_DEG '{offset}' is not a number")))?;
        }
        if let Some(timeout) = var("LOCI_HTTP_TIMEOUT_SECS") {
            config.timeout_secs = Some(timeout.parse::<u64>().map_err(|_| {
                Error::Config(format!("LOCI_HTTP_TIMEOUT_SECS '{timeout}' is not a whole number"))
            })?);
        }

        Ok(config)
    }
}

// Keep the key out of logs.
impl fmt::Debug for StreetViewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreetViewConfig")
            .field("api_key", &"<redacted>")
            .field("metadata_url", &self.metadata_url)
            .field("image_url", &self.image_url)
            .field("image_size", &self.image_size)
            .field("pitch", &self.pitch)
            .field("footpath_offset_deg", &self.footpath_offset_deg)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn is_valid_size(size: &str) -> bool {
    match size.split_once('x') {
        Some((w, h)) => w.parse::<u32>().is_ok_and(|w| w > 0) && h.parse::<u32>().is_ok_and(|h| h > 0),
        None => false,
    }
}

/// Paths to the server's data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Per-run output directories (`data/runs/<run-id>/`).
    pub runs: PathBuf,
    /// Optional banner image shown above the upload form.
    pub banner: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            runs: root.join("runs"),
            banner: root.join(DEFAULT_BANNER_FILE),
            root,
        };
        std::fs::create_dir_all(&paths.runs)?;
        Ok(paths)
    }

    /// Output directory for one run.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs.join(run_id)
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub street_view: StreetViewConfig,
}

impl ServerConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let data_paths = DataPaths::new(data_dir)?;
        let street_view = StreetViewConfig::from_env()?;

        Ok(Self {
            port,
            data_paths,
            street_view,
        })
    }
}
