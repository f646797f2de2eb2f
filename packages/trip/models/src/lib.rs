#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trip record, coordinate, and region label types.
//!
//! A [`TripRecord`] is one row of the monthly input batch. Once both of its
//! endpoints have been attributed to a region it becomes an
//! [`EnrichedTrip`], whose labels borrow from the region index that
//! resolved them.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in (longitude, latitude) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from a longitude/latitude pair.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns `true` if both components are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// A single trip from the input batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    /// Pick-up location.
    pub origin: Coordinate,
    /// Drop-off location.
    pub destination: Coordinate,
    /// Numeric weight of the trip (passenger count).
    pub weight: f64,
}

impl TripRecord {
    /// Creates a trip record.
    #[must_use]
    pub const fn new(origin: Coordinate, destination: Coordinate, weight: f64) -> Self {
        Self {
            origin,
            destination,
            weight,
        }
    }
}

/// The two hierarchical labels of the region containing a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionLabels<'a> {
    /// Fine-grained label (taxi zone).
    pub fine: &'a str,
    /// Coarse-grained label (borough).
    pub coarse: &'a str,
}

/// Outcome of resolving a coordinate against the region index.
///
/// Missing a region is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution<'a> {
    /// The coordinate lies inside a known region.
    Attributed(RegionLabels<'a>),
    /// The coordinate lies outside every known region.
    Unattributed,
}

impl<'a> Attribution<'a> {
    /// Returns the resolved labels, if any.
    #[must_use]
    pub const fn labels(self) -> Option<RegionLabels<'a>> {
        match self {
            Self::Attributed(labels) => Some(labels),
            Self::Unattributed => None,
        }
    }
}

impl<'a> From<Option<RegionLabels<'a>>> for Attribution<'a> {
    fn from(labels: Option<RegionLabels<'a>>) -> Self {
        labels.map_or(Self::Unattributed, Self::Attributed)
    }
}

/// A trip whose origin and destination both resolved to a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTrip<'a> {
    /// The underlying input record.
    pub trip: TripRecord,
    /// Labels of the region containing the pick-up point.
    pub origin: RegionLabels<'a>,
    /// Labels of the region containing the drop-off point.
    pub destination: RegionLabels<'a>,
}

impl EnrichedTrip<'_> {
    /// Trip weight (passenger count).
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.trip.weight
    }
}
