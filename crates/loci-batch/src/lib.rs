//! Batch download pipeline shared by the command line tool and the web UI.
//!
//! A run pulls rows from a `RowSource`, resolves each one into an image
//! through a `StreetViewApi`, and reports everything that happens to a
//! `ResultSink`. Rows are processed strictly one after another; a failing
//! location is reported and skipped, never fatal.

pub mod archive;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use archive::{build_archive, ARCHIVE_FILE_NAME};
pub use pipeline::{
    DownloadedImage, Downloader, RunSummary, SkipReason, SkippedLocation, FALLBACK_HEADING_NOTICE,
};
pub use sink::{LogSink, ResultSink, RunEvent};
pub use source::{CsvRowSource, LocationRow, RowSource};
