//! Core data model: coordinates, view types and camera headings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parse a latitude/longitude pair as read from an input table.
    ///
    /// Values may carry surrounding whitespace. Both must be finite and inside
    /// the usual latitude/longitude ranges.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, Error> {
        let parse_one = |raw: &str, what: &str| -> Result<f64, Error> {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::InvalidCoordinates(format!("{what} '{raw}' is not a number")))
        };

        let coords = Self::new(parse_one(lat, "latitude")?, parse_one(lon, "longitude")?);
        if !(-90.0..=90.0).contains(&coords.lat) {
            return Err(Error::InvalidCoordinates(format!(
                "latitude {} out of range",
                coords.lat
            )));
        }
        if !(-180.0..=180.0).contains(&coords.lon) {
            return Err(Error::InvalidCoordinates(format!(
                "longitude {} out of range",
                coords.lon
            )));
        }
        Ok(coords)
    }
}

/// Rendered as `lat,lon`, the form the metadata endpoint expects.
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Capture context for a location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewType {
    /// Camera aimed from the road; any panorama source.
    #[default]
    #[serde(rename = "RV")]
    RoadView,
    /// Camera aimed along a footpath; outdoor panoramas only, heading offset applied.
    #[serde(rename = "FV")]
    FootpathView,
}

impl ViewType {
    /// Short code used on the command line and in forms.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoadView => "RV",
            Self::FootpathView => "FV",
        }
    }

    /// Case-insensitive lookup of `RV` / `FV`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "RV" => Some(Self::RoadView),
            "FV" => Some(Self::FootpathView),
            _ => None,
        }
    }

    /// Value of the metadata `source` filter, if any.
    pub fn metadata_source(&self) -> Option<&'static str> {
        match self {
            Self::RoadView => None,
            Self::FootpathView => Some("outdoor"),
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ViewType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| Error::InvalidViewType(s.to_string()))
    }
}

/// Camera heading sent to the image endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Heading {
    /// Bearing computed from panorama to target, in [0, 360).
    Degrees(f64),
    /// Panorama position unknown; the endpoint gets the literal `0`.
    Fallback,
}

impl Heading {
    /// Numeric value in degrees (the fallback is 0).
    pub fn degrees(&self) -> f64 {
        match self {
            Self::Degrees(d) => *d,
            Self::Fallback => 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// Query-string rendering of the heading.
impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degrees(d) => write!(f, "{d}"),
            Self::Fallback => f.write_str("0"),
        }
    }
}

/// Name of the n-th input row (1-based), e.g. `location_3`.
pub fn location_name(row_number: usize) -> String {
    format!("location_{row_number}")
}
