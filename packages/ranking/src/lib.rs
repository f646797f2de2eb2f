#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grouped top-K destination ranking.
//!
//! Trips are grouped by (origin, destination) at the requested granularity,
//! the metric is aggregated per group, and destinations are densely ranked
//! within each origin by descending metric.
//!
//! Groups are accumulated in a [`BTreeMap`], so destinations enter the
//! per-origin sort in ascending label order. The sort is stable and keyed on
//! the metric alone, which makes equal metrics rank in ascending destination
//! order on every run.

use std::collections::BTreeMap;

use taxi_dest_ranking_models::{Aggregation, Granularity, RankedDestination, RankingSpec};
use taxi_dest_trip_models::EnrichedTrip;

/// Ranks destinations per origin according to `spec`.
///
/// Output is ordered by origin label, then rank. Origins whose every
/// destination is cut off contribute no rows.
#[must_use]
pub fn rank<'t, 'r: 't>(
    trips: impl IntoIterator<Item = &'t EnrichedTrip<'r>>,
    spec: RankingSpec,
) -> Vec<RankedDestination> {
    let mut groups: BTreeMap<&'r str, BTreeMap<&'r str, f64>> = BTreeMap::new();

    for trip in trips {
        let (origin, destination) = group_key(trip, spec.granularity);
        *groups
            .entry(origin)
            .or_default()
            .entry(destination)
            .or_insert(0.0) += contribution(trip, spec.aggregation);
    }

    let mut ranked = Vec::new();

    for (origin, destinations) in groups {
        let mut destinations: Vec<(&str, f64)> = destinations.into_iter().collect();
        destinations.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (rank, (destination, metric)) in (1u32..).zip(destinations) {
            if !spec.cutoff.admits(rank) {
                break;
            }
            ranked.push(RankedDestination {
                origin: origin.to_string(),
                destination: destination.to_string(),
                rank,
                metric,
            });
        }
    }

    log::debug!(
        "Ranked {} {} destinations ({:?})",
        ranked.len(),
        spec.granularity,
        spec.cutoff
    );

    ranked
}

fn group_key<'r>(trip: &EnrichedTrip<'r>, granularity: Granularity) -> (&'r str, &'r str) {
    match granularity {
        Granularity::Zone => (trip.origin.fine, trip.destination.fine),
        Granularity::Borough => (trip.origin.coarse, trip.destination.coarse),
    }
}

fn contribution(trip: &EnrichedTrip<'_>, aggregation: Aggregation) -> f64 {
    match aggregation {
        Aggregation::Sum => trip.weight(),
        Aggregation::Count => 1.0,
    }
}
