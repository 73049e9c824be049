//! Result sinks: where a run reports what happened.

use loci_core::ViewType;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::pipeline::{DownloadedImage, SkippedLocation};

/// Everything a run reports, in the order it happens.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunEvent {
    Started {
        total: usize,
        view_type: ViewType,
    },
    /// Image written to disk.
    Downloaded(DownloadedImage),
    /// Location produced no image.
    Skipped(SkippedLocation),
    /// Recoverable oddity, e.g. the heading fallback.
    Notice {
        location: String,
        message: String,
    },
    /// Emitted after every row, skipped or not.
    Progress {
        processed: usize,
        total: usize,
    },
}

pub trait ResultSink: Send {
    fn record(&mut self, event: &RunEvent);
}

/// Collects events in memory.
impl ResultSink for Vec<RunEvent> {
    fn record(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}

/// Reports events through `tracing`; used by the command line tool.
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn record(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { total, view_type } => {
                info!("Processing {} locations with view type {}", total, view_type);
            }
            RunEvent::Downloaded(image) => {
                info!("Image saved for location: {} ({})", image.name, image.path.display());
            }
            RunEvent::Skipped(skip) => {
                warn!("Skipping {}: {}", skip.name, skip.message);
            }
            RunEvent::Notice { location, message } => {
                warn!("{}: {}", location, message);
            }
            RunEvent::Progress { processed, total } => {
                debug!("Progress {}/{}", processed, total);
            }
        }
    }
}
