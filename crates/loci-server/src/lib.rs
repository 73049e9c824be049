//! Loci web server: CSV upload, live run progress, image gallery and zip download.

pub mod routes;
pub mod state;
pub mod worker;

pub use routes::build_router;
pub use state::{AppState, MessageLevel, RunMessage, RunRecord, RunStatus};
