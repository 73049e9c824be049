//! Background run execution: one tokio task per uploaded table.

use std::sync::Arc;

use loci_batch::{CsvRowSource, Downloader, ResultSink, RowSource, RunEvent, SkipReason};
use loci_core::ViewType;
use tracing::{debug, error, info};

use crate::state::{AppState, MessageLevel};

/// Mirrors pipeline events into the run's record.
pub struct RunStateSink {
    state: Arc<AppState>,
    run_id: String,
}

impl RunStateSink {
    pub fn new(state: Arc<AppState>, run_id: impl Into<String>) -> Self {
        Self {
            state,
            run_id: run_id.into(),
        }
    }
}

impl ResultSink for RunStateSink {
    fn record(&mut self, event: &RunEvent) {
        debug!("Run {}: {:?}", self.run_id, event);
        self.state.update_run(&self.run_id, |record| match event {
            RunEvent::Started { total, .. } => {
                record.total = *total;
            }
            RunEvent::Downloaded(image) => {
                record.images.push(image.clone());
            }
            RunEvent::Skipped(skip) => {
                let level = match skip.reason {
                    SkipReason::InvalidCoordinates | SkipReason::NoCoverage => MessageLevel::Warning,
                    SkipReason::MetadataError | SkipReason::ImageError | SkipReason::WriteError => {
                        MessageLevel::Error
                    }
                };
                record.push_message(
                    level,
                    Some(skip.name.as_str()),
                    format!("Skipping {}: {}", skip.name, skip.message),
                );
            }
            RunEvent::Notice { location, message } => {
                record.push_message(MessageLevel::Warning, Some(location.as_str()), format!("{location}: {message}"));
            }
            RunEvent::Progress { processed, .. } => {
                record.processed = *processed;
            }
        });
    }
}

/// Start processing `source` for an already registered run.
pub fn start_run(state: Arc<AppState>, run_id: String, source: CsvRowSource, view_type: ViewType) {
    tokio::spawn(async move {
        let Some(output_dir) = state.get_run(&run_id).map(|r| r.output_dir) else {
            error!("Run {} vanished before it started", run_id);
            return;
        };
        let downloader = Downloader::new(state.api.clone(), &output_dir)
            .with_view_type(view_type)
            .with_footpath_offset(state.footpath_offset_deg);

        info!("Run {} started ({} rows, {})", run_id, source.total(), view_type);
        let mut sink = RunStateSink::new(state.clone(), run_id.clone());
        let result = downloader.run(source, &mut sink).await;

        if let Err(e) = &result {
            error!("Run {} failed: {}", run_id, e);
        }
        state.finish_run(&run_id, result);
    });
}
