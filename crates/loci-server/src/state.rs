//! Shared application state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use loci_batch::{DownloadedImage, RunSummary};
use loci_core::{DataPaths, Result, ServerConfig, ViewType, FOOTPATH_HEADING_OFFSET_DEG};
use loci_streetview::{StreetViewApi, StreetViewClient};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Finished runs kept (record and image directory) before the oldest are evicted.
pub const MAX_RETAINED_RUNS: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A line shown under the progress bar.
#[derive(Debug, Clone, Serialize)]
pub struct RunMessage {
    pub level: MessageLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub text: String,
}

/// State of one upload-triggered run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub filename: String,
    pub view_type: ViewType,
    pub status: RunStatus,
    pub total: usize,
    pub processed: usize,
    pub images: Vec<DownloadedImage>,
    pub messages: Vec<RunMessage>,
    pub output_dir: PathBuf,
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl RunRecord {
    pub fn new(id: String, filename: String, view_type: ViewType, total: usize, output_dir: PathBuf) -> Self {
        Self {
            id,
            filename,
            view_type,
            status: RunStatus::Running,
            total,
            processed: 0,
            images: Vec::new(),
            messages: Vec::new(),
            output_dir,
            error: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        }
    }

    /// Fraction of rows processed, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            if self.status == RunStatus::Running { 0.0 } else { 1.0 }
        } else {
            (self.processed as f64 / self.total as f64).min(1.0)
        }
    }

    pub fn push_message(&mut self, level: MessageLevel, location: Option<&str>, text: impl Into<String>) {
        self.messages.push(RunMessage {
            level,
            location: location.map(str::to_string),
            text: text.into(),
        });
    }

    /// Find a downloaded image by location name (`location_1` or `location_1.jpg`).
    pub fn image(&self, name: &str) -> Option<&DownloadedImage> {
        let name = name.strip_suffix(".jpg").unwrap_or(name);
        self.images.iter().find(|img| img.name == name)
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub data_paths: DataPaths,
    pub api: Arc<dyn StreetViewApi>,
    pub footpath_offset_deg: f64,
    pub max_retained_runs: usize,
    pub runs: RwLock<HashMap<String, RunRecord>>,
}

impl AppState {
    pub fn new(data_paths: DataPaths, api: Arc<dyn StreetViewApi>) -> Self {
        Self {
            data_paths,
            api,
            footpath_offset_deg: FOOTPATH_HEADING_OFFSET_DEG,
            max_retained_runs: MAX_RETAINED_RUNS,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// State backed by the real Street View client.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let client = StreetViewClient::new(config.street_view.clone())?;
        let mut state = Self::new(config.data_paths.clone(), Arc::new(client));
        state.footpath_offset_deg = config.street_view.footpath_offset_deg;
        Ok(state)
    }

    pub fn with_max_retained_runs(mut self, max: usize) -> Self {
        self.max_retained_runs = max;
        self
    }

    /// Insert a new run, evicting the oldest finished runs so that at most
    /// `max_retained_runs` records are held. Returns the output directories
    /// of evicted runs for the caller to delete.
    pub fn register_run(&self, record: RunRecord) -> Vec<PathBuf> {
        let mut runs = self.runs.write();
        let keep_finished = self.max_retained_runs.saturating_sub(1);

        let mut finished: Vec<(i64, String)> = runs
            .values()
            .filter(|r| r.status != RunStatus::Running)
            .map(|r| (r.completed_at.unwrap_or(r.started_at), r.id.clone()))
            .collect();
        finished.sort();

        let excess = finished.len().saturating_sub(keep_finished);
        let evicted = finished
            .into_iter()
            .take(excess)
            .filter_map(|(_, id)| runs.remove(&id))
            .map(|r| r.output_dir)
            .collect();

        runs.insert(record.id.clone(), record);
        evicted
    }

    /// Apply `f` to a run record, if it exists.
    pub fn update_run(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) {
        if let Some(record) = self.runs.write().get_mut(run_id) {
            f(record);
        }
    }

    pub fn get_run(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().get(run_id).cloned()
    }

    /// Mark a run finished with the pipeline's result.
    pub fn finish_run(&self, run_id: &str, result: Result<RunSummary>) {
        self.update_run(run_id, |record| {
            record.completed_at = Some(chrono::Utc::now().timestamp_millis());
            match result {
                Ok(summary) => {
                    record.status = RunStatus::Completed;
                    record.processed = record.processed.max(summary.total);
                    if summary.downloaded.is_empty() {
                        record.push_message(MessageLevel::Info, None, "No images were downloaded.");
                    }
                }
                Err(e) => {
                    record.status = RunStatus::Failed;
                    record.push_message(MessageLevel::Error, None, e.to_string());
                    record.error = Some(e.to_string());
                }
            }
        });
    }
}
