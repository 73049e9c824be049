//! Error types for Loci.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response (connect failure, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status code.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The metadata endpoint answered, but has no panorama for the location.
    #[error("No Street View available for location: {location} (status {status})")]
    NoCoverage { location: String, status: String },

    /// The input table lacks required columns. Holds the missing column names.
    #[error("CSV must contain 'latitude' and 'longitude' columns.")]
    MissingColumns(Vec<String>),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid view type: {0}")]
    InvalidViewType(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
