//! Loci Core: configuration, error type, data model and heading math.

pub mod config;
pub mod error;
pub mod heading;
pub mod types;

pub use config::{DataPaths, ServerConfig, StreetViewConfig};
pub use error::{Error, Result};
pub use heading::{calculate_heading, calculate_heading_with_offset, FOOTPATH_HEADING_OFFSET_DEG};
pub use types::{location_name, Coordinates, Heading, ViewType};
