//! Trip enrichment and filtering.
//!
//! Attributes both endpoints of each trip to a region and yields only the
//! trips whose origin and destination both resolved. The transformation is
//! lazy and preserves input order.

use serde::Serialize;
use taxi_dest_spatial::RegionIndex;
use taxi_dest_trip_models::{EnrichedTrip, TripRecord};

/// Counters describing how many trips survived attribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStats {
    /// Trips consumed from the input.
    pub seen: u64,
    /// Trips with both endpoints attributed.
    pub kept: u64,
    /// Trips whose pick-up point fell outside every region.
    pub origin_misses: u64,
    /// Trips whose drop-off point fell outside every region.
    pub destination_misses: u64,
}

impl EnrichmentStats {
    /// Trips dropped because at least one endpoint was unattributed.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.seen - self.kept
    }
}

/// Lazy iterator returned by [`enrich`].
pub struct Enrich<'a, I> {
    records: I,
    index: &'a RegionIndex,
    stats: EnrichmentStats,
}

impl<I> Enrich<'_, I> {
    /// Counters for the trips consumed so far.
    #[must_use]
    pub const fn stats(&self) -> EnrichmentStats {
        self.stats
    }
}

impl<'a, I> Iterator for Enrich<'a, I>
where
    I: Iterator<Item = TripRecord>,
{
    type Item = EnrichedTrip<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;

        for trip in self.records.by_ref() {
            self.stats.seen += 1;

            let origin = index.attribute(trip.origin).labels();
            let destination = index.attribute(trip.destination).labels();

            if let (Some(origin), Some(destination)) = (origin, destination) {
                self.stats.kept += 1;
                return Some(EnrichedTrip {
                    trip,
                    origin,
                    destination,
                });
            }

            if origin.is_none() {
                self.stats.origin_misses += 1;
            }
            if destination.is_none() {
                self.stats.destination_misses += 1;
            }
        }
        None
    }
}

/// Attributes both endpoints of every trip, dropping trips with an
/// unattributed endpoint.
pub fn enrich<I>(records: I, index: &RegionIndex) -> Enrich<'_, I::IntoIter>
where
    I: IntoIterator<Item = TripRecord>,
{
    Enrich {
        records: records.into_iter(),
        index,
        stats: EnrichmentStats::default(),
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};
    use taxi_dest_spatial::Region;
    use taxi_dest_trip_models::Coordinate;

    use super::*;

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + 1.0, y),
                (x + 1.0, y + 1.0),
                (x, y + 1.0),
                (x, y),
            ]),
            vec![],
        )])
    }

    fn index() -> RegionIndex {
        RegionIndex::build(vec![
            Region::new("Midtown", "Manhattan", square(0.0, 0.0)),
            Region::new("Astoria", "Queens", square(2.0, 0.0)),
        ])
    }

    fn trip(from: (f64, f64), to: (f64, f64), weight: f64) -> TripRecord {
        TripRecord::new(
            Coordinate::new(from.0, from.1),
            Coordinate::new(to.0, to.1),
            weight,
        )
    }

    #[test]
    fn keeps_trips_with_both_endpoints_attributed() {
        let index = index();
        let trips = vec![
            trip((0.5, 0.5), (2.5, 0.5), 1.0),
            trip((9.0, 9.0), (2.5, 0.5), 2.0),
            trip((2.5, 0.5), (0.5, 0.5), 3.0),
            trip((0.5, 0.5), (9.0, 9.0), 4.0),
            trip((9.0, 9.0), (9.0, 9.0), 5.0),
        ];

        let mut enriched = enrich(trips, &index);
        let kept: Vec<EnrichedTrip<'_>> = enriched.by_ref().collect();

        let weights: Vec<f64> = kept.iter().map(EnrichedTrip::weight).collect();
        assert_eq!(weights, vec![1.0, 3.0], "input order must be preserved");
        assert_eq!(kept[0].origin.fine, "Midtown");
        assert_eq!(kept[0].destination.coarse, "Queens");
        assert_eq!(kept[1].origin.fine, "Astoria");

        let stats = enriched.stats();
        assert_eq!(stats.seen, 5);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.dropped(), 3);
        assert_eq!(stats.origin_misses, 2);
        assert_eq!(stats.destination_misses, 2);
    }

    #[test]
    fn enrichment_is_lazy() {
        let index = index();
        let trips = vec![
            trip((0.5, 0.5), (2.5, 0.5), 1.0),
            trip((0.5, 0.5), (2.5, 0.5), 2.0),
        ];

        let mut enriched = enrich(trips, &index);
        assert_eq!(enriched.stats().seen, 0);
        assert!(enriched.next().is_some());
        assert_eq!(enriched.stats().seen, 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let index = index();
        let mut enriched = enrich(Vec::<TripRecord>::new(), &index);
        assert!(enriched.next().is_none());
        assert_eq!(enriched.stats(), EnrichmentStats::default());
    }
}
