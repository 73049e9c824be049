//! Per-location download pipeline and the run loop around it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use loci_core::{calculate_heading_with_offset, Error, Heading, Result, ViewType, FOOTPATH_HEADING_OFFSET_DEG};
use loci_streetview::StreetViewApi;
use serde::Serialize;
use tracing::{debug, info};

use crate::sink::{ResultSink, RunEvent};
use crate::source::{LocationRow, RowSource};

/// An image written for one location.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedImage {
    /// Location name, e.g. `location_1`. The file is `<name>.jpg`.
    pub name: String,
    pub path: PathBuf,
    pub pano_id: String,
    /// Heading in degrees that was requested.
    pub heading: f64,
    /// Set when panorama coordinates were missing and heading `0` was used.
    pub fallback_heading: bool,
}

impl DownloadedImage {
    pub fn file_name(&self) -> String {
        image_file_name(&self.name)
    }
}

/// Why a location produced no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidCoordinates,
    NoCoverage,
    MetadataError,
    ImageError,
    WriteError,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedLocation {
    pub name: String,
    pub reason: SkipReason,
    pub message: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub downloaded: Vec<DownloadedImage>,
    pub skipped: Vec<SkippedLocation>,
    /// `<location>: <notice>` lines, e.g. heading fallbacks.
    pub notices: Vec<String>,
}

/// Reported when an OK panorama comes without coordinates.
pub const FALLBACK_HEADING_NOTICE: &str = "Missing panorama location. Using heading=0.";

/// `<location name>.jpg`
pub fn image_file_name(location_name: &str) -> String {
    format!("{location_name}.jpg")
}

/// Resolves rows into images, one location at a time.
pub struct Downloader {
    api: Arc<dyn StreetViewApi>,
    output_dir: PathBuf,
    view_type: ViewType,
    footpath_offset_deg: f64,
}

impl Downloader {
    pub fn new(api: Arc<dyn StreetViewApi>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            api,
            output_dir: output_dir.as_ref().to_path_buf(),
            view_type: ViewType::default(),
            footpath_offset_deg: FOOTPATH_HEADING_OFFSET_DEG,
        }
    }

    pub fn with_view_type(mut self, view_type: ViewType) -> Self {
        self.view_type = view_type;
        self
    }

    pub fn with_footpath_offset(mut self, offset_deg: f64) -> Self {
        self.footpath_offset_deg = offset_deg;
        self
    }

    /// Process every row of `source`, reporting to `sink`.
    ///
    /// Only a failure to create the output directory aborts the run; every
    /// per-location problem becomes a `Skipped` event.
    pub async fn run<S, K>(&self, mut source: S, sink: &mut K) -> Result<RunSummary>
    where
        S: RowSource,
        K: ResultSink + ?Sized,
    {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let total = source.total();
        let mut summary = RunSummary {
            total,
            ..Default::default()
        };
        sink.record(&RunEvent::Started {
            total,
            view_type: self.view_type,
        });

        let mut processed = 0;
        while let Some(row) = source.next_row() {
            match self.process_location(&row, sink).await {
                Ok(image) => {
                    if image.fallback_heading {
                        summary
                            .notices
                            .push(format!("{}: {}", image.name, FALLBACK_HEADING_NOTICE));
                    }
                    summary.downloaded.push(image.clone());
                    sink.record(&RunEvent::Downloaded(image));
                }
                Err(skip) => {
                    summary.skipped.push(skip.clone());
                    sink.record(&RunEvent::Skipped(skip));
                }
            }
            processed += 1;
            sink.record(&RunEvent::Progress {
                processed,
                total: total.max(processed),
            });
        }

        info!(
            "Run finished: {} downloaded, {} skipped of {}",
            summary.downloaded.len(),
            summary.skipped.len(),
            processed
        );
        Ok(summary)
    }

    /// Metadata lookup → heading → image fetch → file, for one row.
    ///
    /// Notices (the heading fallback) go straight to `sink`; the final
    /// outcome is returned for the caller to record.
    pub async fn process_location<K>(
        &self,
        row: &LocationRow,
        sink: &mut K,
    ) -> std::result::Result<DownloadedImage, SkippedLocation>
    where
        K: ResultSink + ?Sized,
    {
        let name = row.name.clone();
        let skip = |reason: SkipReason, message: String| SkippedLocation {
            name: name.clone(),
            reason,
            message,
        };

        let target = match &row.target {
            Ok(target) => *target,
            Err(e) => return Err(skip(SkipReason::InvalidCoordinates, e.to_string())),
        };

        let pano = match self.api.metadata(target, self.view_type).await {
            Ok(pano) => pano,
            Err(e @ Error::NoCoverage { .. }) => {
                return Err(skip(SkipReason::NoCoverage, format!("no metadata ({e})")));
            }
            Err(e) => {
                return Err(skip(SkipReason::MetadataError, format!("Error fetching metadata: {e}")));
            }
        };

        let heading = match pano.location {
            Some(pano_pos) => Heading::Degrees(calculate_heading_with_offset(
                pano_pos,
                target,
                self.view_type,
                self.footpath_offset_deg,
            )),
            None => {
                sink.record(&RunEvent::Notice {
                    location: name.clone(),
                    message: FALLBACK_HEADING_NOTICE.to_string(),
                });
                Heading::Fallback
            }
        };
        debug!("{}: panorama {} heading {}", name, pano.pano_id, heading);

        let bytes = match self.api.image(&pano.pano_id, heading).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(skip(
                    SkipReason::ImageError,
                    format!("Error fetching image for {name}: {e}"),
                ));
            }
        };

        let path = self.output_dir.join(image_file_name(&name));
        if let Err(e) = write_image(&path, &bytes).await {
            return Err(skip(
                SkipReason::WriteError,
                format!("Failed to write {}: {e}", path.display()),
            ));
        }

        Ok(DownloadedImage {
            name,
            path,
            pano_id: pano.pano_id,
            heading: heading.degrees(),
            fallback_heading: heading.is_fallback(),
        })
    }
}

/// Write through a `.part` file so a failed write never leaves a truncated image.
async fn write_image(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            debug!("Could not remove {}: {}", partial.display(), e);
        }
    }
    result
}
