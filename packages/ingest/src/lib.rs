#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monthly popular-destination pipeline.
//!
//! Attributes a month of taxi trips to zones, ranks the top destinations
//! per origin zone and per origin borough, reconciles both rankings against
//! the previous month, and commits everything to the [`DestinationStore`]
//! in one transaction.
//!
//! [`DestinationStore`]: taxi_dest_database::DestinationStore

pub mod config;
pub mod pipeline;

use taxi_dest_database::{DbError, DestinationStore};
use taxi_dest_history::HistoryError;
use taxi_dest_spatial::{RegionIndex, SpatialError};
use taxi_dest_trip::TripError;

use crate::config::{ConfigError, PipelineConfig};

pub use pipeline::Pipeline;

/// Errors that can occur during a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Region polygons could not be loaded.
    #[error("Region error: {0}")]
    Spatial(#[from] SpatialError),

    /// Trips could not be loaded.
    #[error("Trip error: {0}")]
    Trip(#[from] TripError),

    /// The period could not be resolved or reconciled.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// The store failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Loads the region index named by `config`.
///
/// # Errors
///
/// Returns [`PipelineError::Spatial`] if the `GeoJSON` file cannot be read
/// or yields no regions.
pub fn load_regions(config: &PipelineConfig) -> Result<RegionIndex, PipelineError> {
    Ok(RegionIndex::load(
        &config.regions_path,
        &config.label_properties(),
    )?)
}

/// Opens the store named by `config`.
///
/// # Errors
///
/// Returns [`PipelineError::Database`] if the database cannot be opened.
pub fn open_store(config: &PipelineConfig) -> Result<DestinationStore, PipelineError> {
    Ok(DestinationStore::open(&config.database_path)?)
}
