#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trip loading and enrichment.
//!
//! Reads the monthly trip CSV into [`TripRecord`]s and attributes both
//! endpoints of every trip to a taxi zone, dropping trips that start or end
//! outside every known zone.
//!
//! [`TripRecord`]: taxi_dest_trip_models::TripRecord

pub mod enrich;
pub mod load;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading trips.
#[derive(Debug, Error)]
pub enum TripError {
    /// The trip file could not be opened.
    #[error("Failed to open trip file {}: {source}", .path.display())]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header row.
    #[error("Trip file has no '{column}' column")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// A row has a missing or unparseable required field (strict mode only).
    #[error("Malformed trip on line {line}: {message}")]
    Malformed {
        /// 1-based line number of the row.
        line: u64,
        /// Description of what went wrong.
        message: String,
    },
}
