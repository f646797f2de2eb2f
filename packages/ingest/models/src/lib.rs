#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline run summaries and progress reporting.

pub mod progress;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use taxi_dest_history_models::{Period, ReconcileMode, WriteMode};
use taxi_dest_ranking_models::Granularity;

/// Result of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Month that was processed.
    pub period: Period,
    /// How the month was reconciled against history.
    pub mode: ReconcileMode,
    /// Top-K the run was asked for.
    pub top_k: u32,
    /// Well-formed trips read from the input.
    pub trips_read: u64,
    /// Malformed rows dropped by the loader.
    pub malformed: u64,
    /// Trips with both endpoints attributed to a region.
    pub trips_attributed: u64,
    /// Trips whose pick-up point fell outside every region.
    pub origin_misses: u64,
    /// Trips whose drop-off point fell outside every region.
    pub destination_misses: u64,
    /// Per-granularity table results, zone first.
    pub tables: Vec<GranularitySummary>,
    /// How long the run took.
    pub duration: Duration,
}

impl RunSummary {
    /// Trips dropped because an endpoint was unattributed.
    #[must_use]
    pub const fn trips_unattributed(&self) -> u64 {
        self.trips_read - self.trips_attributed
    }

    /// Summary for one granularity, if it was written.
    #[must_use]
    pub fn table(&self, granularity: Granularity) -> Option<&GranularitySummary> {
        self.tables.iter().find(|t| t.granularity == granularity)
    }
}

/// What one run wrote for a single granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranularitySummary {
    /// Zone or borough.
    pub granularity: Granularity,
    /// Distinct origins with at least one ranked destination.
    pub origins: usize,
    /// Rows written to the `current_*` table.
    pub current_rows: usize,
    /// Rows written to the `history_*` table.
    pub history_rows: usize,
    /// Whether history was replaced or appended.
    pub write_mode: WriteMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            period: "2009-12".parse().unwrap(),
            mode: ReconcileMode::Incremental {
                previous: "2009-11".parse().unwrap(),
            },
            top_k: 3,
            trips_read: 10,
            malformed: 1,
            trips_attributed: 7,
            origin_misses: 2,
            destination_misses: 2,
            tables: vec![GranularitySummary {
                granularity: Granularity::Borough,
                origins: 2,
                current_rows: 3,
                history_rows: 1,
                write_mode: WriteMode::Append,
            }],
            duration: Duration::from_millis(250),
        }
    }

    #[test]
    fn counts_unattributed_trips() {
        assert_eq!(summary().trips_unattributed(), 3);
    }

    #[test]
    fn finds_tables_by_granularity() {
        let summary = summary();
        assert_eq!(summary.table(Granularity::Borough).unwrap().current_rows, 3);
        assert!(summary.table(Granularity::Zone).is_none());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["period"], "2009-12");
        assert_eq!(json["topK"], 3);
        assert_eq!(json["mode"]["mode"], "incremental");
        assert_eq!(json["mode"]["previous"], "2009-11");
        assert_eq!(json["tables"][0]["writeMode"], "append");
    }
}
