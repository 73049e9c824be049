//! Row sources: where the list of target locations comes from.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use loci_core::{location_name, Coordinates, Error, Result};

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

/// One input row, already numbered and named.
#[derive(Debug)]
pub struct LocationRow {
    /// 1-based position in the input.
    pub number: usize,
    /// `location_<number>`.
    pub name: String,
    /// Parsed target, or why the row could not be parsed.
    pub target: Result<Coordinates>,
}

impl LocationRow {
    pub fn new(number: usize, target: Result<Coordinates>) -> Self {
        Self {
            number,
            name: location_name(number),
            target,
        }
    }
}

/// Ordered supply of rows for a run.
pub trait RowSource: Send {
    /// Number of rows the source will yield. Drives progress reporting.
    fn total(&self) -> usize;

    fn next_row(&mut self) -> Option<LocationRow>;
}

/// Rows read from a CSV table with `latitude` and `longitude` columns.
///
/// The whole table is read and column-checked up front so that a bad upload
/// is rejected before any request is made. Extra columns are ignored.
#[derive(Debug)]
pub struct CsvRowSource {
    rows: std::vec::IntoIter<LocationRow>,
    total: usize,
}

impl CsvRowSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| Error::Csv(e.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
        };

        let (lat_idx, lon_idx) = match (column(LATITUDE_COLUMN), column(LONGITUDE_COLUMN)) {
            (Some(lat), Some(lon)) => (lat, lon),
            (lat, lon) => {
                let mut missing = Vec::new();
                if lat.is_none() {
                    missing.push(LATITUDE_COLUMN.to_string());
                }
                if lon.is_none() {
                    missing.push(LONGITUDE_COLUMN.to_string());
                }
                return Err(Error::MissingColumns(missing));
            }
        };

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let target = match record {
                Ok(record) => Coordinates::parse(
                    record.get(lat_idx).unwrap_or(""),
                    record.get(lon_idx).unwrap_or(""),
                ),
                Err(e) => Err(Error::Csv(e.to_string())),
            };
            rows.push(LocationRow::new(idx + 1, target));
        }

        let total = rows.len();
        Ok(Self {
            rows: rows.into_iter(),
            total,
        })
    }
}

impl RowSource for CsvRowSource {
    fn total(&self) -> usize {
        self.total
    }

    fn next_row(&mut self) -> Option<LocationRow> {
        self.rows.next()
    }
}
