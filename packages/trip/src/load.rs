//! Trip CSV loader.
//!
//! Columns are located by header name, so extra columns (fares, timestamps,
//! vendor codes) are ignored and column order does not matter. Rows with a
//! missing or unparseable coordinate or weight are malformed: they are
//! counted and dropped, or reject the whole batch in strict mode.

use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use taxi_dest_trip_models::{Coordinate, TripRecord};

use crate::TripError;

/// Header names of the columns a trip row is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripColumns {
    /// Pick-up longitude.
    pub origin_longitude: String,
    /// Pick-up latitude.
    pub origin_latitude: String,
    /// Drop-off longitude.
    pub destination_longitude: String,
    /// Drop-off latitude.
    pub destination_latitude: String,
    /// Trip weight (passenger count).
    pub weight: String,
}

impl Default for TripColumns {
    fn default() -> Self {
        Self {
            origin_longitude: "Start_Lon".to_string(),
            origin_latitude: "Start_Lat".to_string(),
            destination_longitude: "End_Lon".to_string(),
            destination_latitude: "End_Lat".to_string(),
            weight: "Passenger_Count".to_string(),
        }
    }
}

/// Trips read from one input batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTrips {
    /// Well-formed trips in file order.
    pub trips: Vec<TripRecord>,
    /// Number of malformed rows that were dropped.
    pub malformed: u64,
}

/// Resolved positions of the required columns within a header row.
struct ColumnPositions {
    origin_longitude: usize,
    origin_latitude: usize,
    destination_longitude: usize,
    destination_latitude: usize,
    weight: usize,
}

impl ColumnPositions {
    fn resolve(headers: &StringRecord, columns: &TripColumns) -> Result<Self, TripError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TripError::MissingColumn {
                    column: name.to_string(),
                })
        };

        Ok(Self {
            origin_longitude: find(&columns.origin_longitude)?,
            origin_latitude: find(&columns.origin_latitude)?,
            destination_longitude: find(&columns.destination_longitude)?,
            destination_latitude: find(&columns.destination_latitude)?,
            weight: find(&columns.weight)?,
        })
    }
}

/// Reads trip CSV files into [`TripRecord`]s.
#[derive(Debug, Clone)]
pub struct TripLoader {
    columns: TripColumns,
    delimiter: u8,
    strict: bool,
    max_records: Option<u64>,
}

impl Default for TripLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TripLoader {
    /// Creates a loader for comma-delimited files with the default column
    /// names, dropping malformed rows.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: TripColumns::default(),
            delimiter: b',',
            strict: false,
            max_records: None,
        }
    }

    /// Overrides the column names.
    #[must_use]
    pub fn with_columns(mut self, columns: TripColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the field delimiter (e.g. `b'\t'` for TSV files).
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Rejects the whole batch on the first malformed row instead of
    /// dropping it.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Limits the number of rows read from the file.
    #[must_use]
    pub const fn with_max_records(mut self, max: u64) -> Self {
        self.max_records = Some(max);
        self
    }

    /// Reads trips from a CSV file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`TripError`] if the file cannot be opened or parsed.
    pub fn read_path(&self, path: &Path) -> Result<LoadedTrips, TripError> {
        let file = std::fs::File::open(path).map_err(|source| TripError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded = self.read(file)?;
        log::info!(
            "Read {} trips from {} ({} malformed rows dropped)",
            loaded.trips.len(),
            path.display(),
            loaded.malformed
        );
        Ok(loaded)
    }

    /// Reads trips from any CSV source with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`TripError`] if the CSV is unreadable, a required column is
    /// missing, or (in strict mode) a row is malformed.
    pub fn read<R: Read>(&self, source: R) -> Result<LoadedTrips, TripError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(source);

        let positions = ColumnPositions::resolve(reader.headers()?, &self.columns)?;
        let mut loaded = LoadedTrips::default();
        let mut read = 0u64;

        for result in reader.records() {
            let record = result?;
            read += 1;

            match parse_trip(&record, &positions, &self.columns) {
                Ok(trip) => loaded.trips.push(trip),
                Err(message) => {
                    let line = record.position().map_or(0, csv::Position::line);
                    if self.strict {
                        return Err(TripError::Malformed { line, message });
                    }
                    log::debug!("Dropping malformed trip on line {line}: {message}");
                    loaded.malformed += 1;
                }
            }

            if let Some(max) = self.max_records
                && read >= max
            {
                log::info!("Reached max_records limit ({max}), stopping CSV parse");
                break;
            }
        }

        if loaded.malformed > 0 {
            log::warn!("Dropped {} malformed trip rows", loaded.malformed);
        }

        Ok(loaded)
    }
}

fn parse_trip(
    record: &StringRecord,
    positions: &ColumnPositions,
    columns: &TripColumns,
) -> Result<TripRecord, String> {
    let field = |idx: usize, name: &str| -> Result<f64, String> {
        let raw = record.get(idx).map_or("", str::trim);
        if raw.is_empty() {
            return Err(format!("missing '{name}'"));
        }
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid '{name}' value '{raw}'"))
    };

    let origin = Coordinate::new(
        field(positions.origin_longitude, &columns.origin_longitude)?,
        field(positions.origin_latitude, &columns.origin_latitude)?,
    );
    let destination = Coordinate::new(
        field(positions.destination_longitude, &columns.destination_longitude)?,
        field(positions.destination_latitude, &columns.destination_latitude)?,
    );
    let weight = field(positions.weight, &columns.weight)?;

    Ok(TripRecord::new(origin, destination, weight))
}
