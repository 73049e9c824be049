//! Street View client: panorama metadata lookup and still image fetch.
//!
//! The `StreetViewApi` trait is the seam the batch pipeline talks to;
//! `StreetViewClient` is the reqwest-backed implementation.

pub mod client;
pub mod types;

use async_trait::async_trait;
use loci_core::{Coordinates, Heading, Result, ViewType};

pub use client::StreetViewClient;
pub use types::*;

/// Remote operations needed to resolve one location into an image.
#[async_trait]
pub trait StreetViewApi: Send + Sync {
    /// Look up the panorama nearest to `target`.
    ///
    /// Fails with `Error::Http`/`Error::Status` on transport problems and
    /// `Error::NoCoverage` when the endpoint has no panorama there.
    async fn metadata(&self, target: Coordinates, view_type: ViewType) -> Result<PanoramaMetadata>;

    /// Render a still image from panorama `pano_id` at `heading`.
    async fn image(&self, pano_id: &str, heading: Heading) -> Result<Vec<u8>>;
}
