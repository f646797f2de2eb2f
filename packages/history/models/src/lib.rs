#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Period, history entry, and reconciliation mode types.
//!
//! History is keyed by calendar month. The first month of history
//! bootstraps the tables; every later month appends only the rows that
//! changed since the month before.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use taxi_dest_ranking_models::DestinationRank;

/// Error returned when a period string is not a valid `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period '{value}': expected YYYY-MM")]
pub struct InvalidPeriodError {
    /// The rejected input.
    pub value: String,
}

/// A calendar month, displayed and parsed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// November 2009, the first month of the published history tables.
    pub const DEFAULT_HISTORY_START: Self = Self {
        year: 2009,
        month: 11,
    };

    /// Creates a period from a year and a 1-based month.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriodError`] if the month is out of range or the
    /// year is outside what `chrono` can represent.
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidPeriodError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self::containing)
            .ok_or_else(|| InvalidPeriodError {
                value: format!("{year:04}-{month:02}"),
            })
    }

    /// The month a date falls in.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month of the year, 1-based.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The immediately preceding calendar month.
    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:04}-{:02}", self.year, self.month))
    }
}

impl FromStr for Period {
    type Err = InvalidPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPeriodError {
            value: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = InvalidPeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// What to do when the month before the current one was never recorded.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GapPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Restart history at the current month, replacing what was stored.
    Bootstrap,
}

/// How the current month's ranking is reconciled against history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum ReconcileMode {
    /// Start history over with the full current ranking.
    Bootstrap,
    /// Append the rows that differ from the previous month.
    Incremental {
        /// The month compared against.
        previous: Period,
    },
}

impl ReconcileMode {
    /// Short lowercase name, as recorded in the period ledger.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Incremental { .. } => "incremental",
        }
    }

    /// How the reconciled rows must be written.
    #[must_use]
    pub const fn write_mode(self) -> WriteMode {
        match self {
            Self::Bootstrap => WriteMode::Replace,
            Self::Incremental { .. } => WriteMode::Append,
        }
    }
}

/// How rows are written to a history table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteMode {
    /// Discard every stored row, then insert.
    Replace,
    /// Insert alongside the stored rows.
    Append,
}

/// A ranked destination recorded for a period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Month the ranking was computed for.
    pub period: Period,
    /// Origin region label.
    pub origin: String,
    /// Destination region label.
    pub destination: String,
    /// Rank within the origin.
    pub rank: u32,
}

impl HistoryEntry {
    /// Tags a persisted ranking row with a period.
    #[must_use]
    pub fn new(period: Period, row: DestinationRank) -> Self {
        Self {
            period,
            origin: row.origin,
            destination: row.destination,
            rank: row.rank,
        }
    }

    /// The row without its period tag.
    #[must_use]
    pub fn to_rank(&self) -> DestinationRank {
        DestinationRank::new(self.origin.clone(), self.destination.clone(), self.rank)
    }
}

/// Result of reconciling one ranking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDelta {
    /// How `entries` must be written.
    pub write_mode: WriteMode,
    /// Rows to record for the current period.
    pub entries: Vec<HistoryEntry>,
}
