#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` storage for destination rankings.
//!
//! One `DuckDB` file holds, per granularity, a `current_*` table replaced on
//! every run and a `history_*` table that grows month by month, plus a
//! `processed_periods` ledger of committed runs. A run is written in a single
//! transaction so readers never observe a half-written month.

pub mod paths;
pub mod store;

pub use store::{DestinationStore, RecordedPeriod, RunWrite, TableWrite};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Filesystem error while preparing the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
