#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Month-over-month history reconciliation.
//!
//! Decides whether a month bootstraps or extends the history tables, and
//! computes which ranking rows are new relative to the month before so that
//! unchanged rows are never recorded twice in a row.

pub mod period;
pub mod reconcile;

pub use period::period_from_path;
pub use reconcile::{plan, reconcile};

use taxi_dest_history_models::{InvalidPeriodError, Period};
use thiserror::Error;

/// Errors that can occur while planning or reconciling history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The month before the current one was never recorded.
    #[error("No history recorded for {previous}; cannot extend history with {period}")]
    ContinuityGap {
        /// Month being processed.
        period: Period,
        /// Missing preceding month.
        previous: Period,
    },

    /// The month precedes the configured start of history.
    #[error("Period {period} is before the history start {start}")]
    BeforeHistoryStart {
        /// Month being processed.
        period: Period,
        /// Configured first month of history.
        start: Period,
    },

    /// No period could be derived from the input name.
    #[error("Cannot derive a YYYY-MM period from '{name}'")]
    UnknownPeriod {
        /// The input name that was inspected.
        name: String,
    },

    /// A period string was malformed.
    #[error(transparent)]
    InvalidPeriod(#[from] InvalidPeriodError),
}
