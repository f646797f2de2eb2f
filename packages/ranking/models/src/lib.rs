#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Destination ranking types.
//!
//! Rankings are produced at two granularities. The zone table ranks
//! destination zones by total passengers and keeps ranks up to and including
//! K; the borough table ranks destination boroughs by number of rides and
//! keeps ranks strictly below K. Both conventions are part of the published
//! tables and must not be unified.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Axis along which trips are grouped.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Granularity {
    /// Fine-grained taxi zones.
    Zone,
    /// Coarse-grained boroughs.
    Borough,
}

impl Granularity {
    /// Every granularity, in the order tables are written.
    pub const ALL: [Self; 2] = [Self::Zone, Self::Borough];
}

/// How trips within an (origin, destination) group are combined.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aggregation {
    /// Sum of trip weights (passengers).
    Sum,
    /// Number of trips (rides).
    Count,
}

/// Which ranks survive truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "k")]
pub enum RankCutoff {
    /// Keep ranks `1..=k`.
    AtMost(u32),
    /// Keep ranks `1..k`.
    Below(u32),
}

impl RankCutoff {
    /// Returns `true` if a row with this rank is kept.
    #[must_use]
    pub const fn admits(self, rank: u32) -> bool {
        match self {
            Self::AtMost(k) => rank <= k,
            Self::Below(k) => rank < k,
        }
    }
}

/// Full description of one ranking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSpec {
    /// Grouping axis for origins and destinations.
    pub granularity: Granularity,
    /// Metric aggregation within each group.
    pub aggregation: Aggregation,
    /// Truncation rule.
    pub cutoff: RankCutoff,
}

impl RankingSpec {
    /// Zone table: passengers summed per zone pair, ranks `<= k`.
    #[must_use]
    pub const fn zone_passengers(k: u32) -> Self {
        Self {
            granularity: Granularity::Zone,
            aggregation: Aggregation::Sum,
            cutoff: RankCutoff::AtMost(k),
        }
    }

    /// Borough table: rides counted per borough pair, ranks `< k`.
    #[must_use]
    pub const fn borough_rides(k: u32) -> Self {
        Self {
            granularity: Granularity::Borough,
            aggregation: Aggregation::Count,
            cutoff: RankCutoff::Below(k),
        }
    }

    /// The table spec a run uses for `granularity`.
    #[must_use]
    pub const fn for_granularity(granularity: Granularity, k: u32) -> Self {
        match granularity {
            Granularity::Zone => Self::zone_passengers(k),
            Granularity::Borough => Self::borough_rides(k),
        }
    }
}

/// One ranked destination of an origin, with the metric it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDestination {
    /// Origin region label.
    pub origin: String,
    /// Destination region label.
    pub destination: String,
    /// Dense rank within the origin, starting at 1.
    pub rank: u32,
    /// Aggregated metric value.
    pub metric: f64,
}

impl RankedDestination {
    /// Drops the metric, keeping the persisted columns.
    #[must_use]
    pub fn to_rank(&self) -> DestinationRank {
        DestinationRank {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            rank: self.rank,
        }
    }
}

/// The persisted projection of a ranked destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRank {
    /// Origin region label.
    pub origin: String,
    /// Destination region label.
    pub destination: String,
    /// Dense rank within the origin, starting at 1.
    pub rank: u32,
}

impl DestinationRank {
    /// Creates a row.
    #[must_use]
    pub fn new(origin: impl Into<String>, destination: impl Into<String>, rank: u32) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn cutoff_boundaries_differ_by_one() {
        assert!(RankCutoff::AtMost(3).admits(3));
        assert!(!RankCutoff::AtMost(3).admits(4));
        assert!(RankCutoff::Below(3).admits(2));
        assert!(!RankCutoff::Below(3).admits(3));
    }

    #[test]
    fn zero_cutoff_admits_nothing() {
        for rank in 1..10 {
            assert!(!RankCutoff::AtMost(0).admits(rank));
            assert!(!RankCutoff::Below(0).admits(rank));
        }
    }

    #[test]
    fn presets_match_table_conventions() {
        let zone = RankingSpec::for_granularity(Granularity::Zone, 5);
        assert_eq!(zone.aggregation, Aggregation::Sum);
        assert_eq!(zone.cutoff, RankCutoff::AtMost(5));

        let borough = RankingSpec::for_granularity(Granularity::Borough, 5);
        assert_eq!(borough.aggregation, Aggregation::Count);
        assert_eq!(borough.cutoff, RankCutoff::Below(5));
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!(Granularity::from_str("zone").unwrap(), Granularity::Zone);
        assert_eq!(Granularity::from_str("Borough").unwrap(), Granularity::Borough);
        assert_eq!(Granularity::Borough.as_ref(), "borough");
        assert!(Granularity::from_str("city").is_err());
    }
}
