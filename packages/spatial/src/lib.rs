#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory region index for trip attribution.
//!
//! Loads taxi zone polygons once at startup, builds an R-tree over their
//! bounding boxes, and answers point-in-polygon lookups that resolve a
//! coordinate to its zone and borough. The index is immutable after
//! construction and can be shared freely between threads.

pub mod source;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use taxi_dest_trip_models::{Attribution, Coordinate, RegionLabels};
use thiserror::Error;

pub use source::LabelProperties;

/// Errors that can occur while loading regions.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The regions file could not be read.
    #[error("Failed to read regions file {}: {source}", .path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The regions file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The `GeoJSON` parsed but does not describe any usable region.
    #[error("Invalid region data: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

/// A named polygon with its zone and borough labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Fine-grained label (taxi zone name).
    pub fine_label: String,
    /// Coarse-grained label (borough name).
    pub coarse_label: String,
    /// Region boundary in WGS84 longitude/latitude.
    pub boundary: MultiPolygon<f64>,
}

impl Region {
    /// Creates a region from its labels and boundary.
    #[must_use]
    pub fn new(
        fine_label: impl Into<String>,
        coarse_label: impl Into<String>,
        boundary: MultiPolygon<f64>,
    ) -> Self {
        Self {
            fine_label: fine_label.into(),
            coarse_label: coarse_label.into(),
            boundary,
        }
    }

    fn labels(&self) -> RegionLabels<'_> {
        RegionLabels {
            fine: &self.fine_label,
            coarse: &self.coarse_label,
        }
    }
}

/// A region stored in the R-tree together with its input position.
struct RegionEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
    region: Region,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over a set of non-overlapping regions.
pub struct RegionIndex {
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Builds the index from a set of regions.
    ///
    /// Regions are expected not to overlap. If they do, lookups resolve to
    /// whichever matching region came first in `regions`.
    #[must_use]
    pub fn build(regions: impl IntoIterator<Item = Region>) -> Self {
        let entries: Vec<RegionEntry> = regions
            .into_iter()
            .enumerate()
            .filter_map(|(position, region)| {
                let Some(envelope) = compute_envelope(&region.boundary) else {
                    log::warn!(
                        "Region {} has an empty boundary, skipping",
                        region.fine_label
                    );
                    return None;
                };
                Some(RegionEntry {
                    position,
                    envelope,
                    region,
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Loads regions from a `GeoJSON` file and builds the index.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file cannot be read, is not a
    /// `FeatureCollection`, or contains no usable regions.
    pub fn load(path: &Path, properties: &LabelProperties) -> Result<Self, SpatialError> {
        let regions = source::read_regions(path, properties)?;
        let index = Self::build(regions);
        log::info!(
            "Loaded {} regions across {} boroughs into region index",
            index.len(),
            index.coarse_labels().len()
        );
        Ok(index)
    }

    /// Number of regions in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if the index holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterates over the indexed regions in no particular order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.tree.iter().map(|entry| &entry.region)
    }

    /// Distinct coarse labels present in the index.
    #[must_use]
    pub fn coarse_labels(&self) -> BTreeSet<&str> {
        self.regions().map(|r| r.coarse_label.as_str()).collect()
    }

    /// Looks up the labels of the region containing a point.
    ///
    /// Points on a region boundary are not contained by it. Non-finite
    /// coordinates never match.
    #[must_use]
    pub fn classify(&self, lng: f64, lat: f64) -> Option<RegionLabels<'_>> {
        if !Coordinate::new(lng, lat).is_finite() {
            return None;
        }

        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.region.boundary.contains(&point))
            .min_by_key(|entry| entry.position)
            .map(|entry| entry.region.labels())
    }

    /// Resolves a coordinate to an [`Attribution`].
    #[must_use]
    pub fn attribute(&self, coordinate: Coordinate) -> Attribution<'_> {
        self.classify(coordinate.longitude, coordinate.latitude).into()
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`], or `None` if
/// it has no coordinates.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}


#[cfg(test)]
mod tests {
    use super::test_support::square;
    use super::*;

    fn index() -> RegionIndex {
        RegionIndex::build(vec![
            Region::new("Midtown", "Manhattan", square(0.0, 0.0, 1.0)),
            Region::new("Astoria", "Queens", square(1.0, 0.0, 1.0)),
            Region::new("Park Slope", "Brooklyn", square(0.0, -1.0, 1.0)),
        ])
    }

    #[test]
    fn classifies_point_inside_region() {
        let index = index();
        let labels = index.classify(0.5, 0.5).unwrap();
        assert_eq!(labels.fine, "Midtown");
        assert_eq!(labels.coarse, "Manhattan");

        let labels = index.classify(1.25, 0.75).unwrap();
        assert_eq!(labels.fine, "Astoria");
        assert_eq!(labels.coarse, "Queens");
    }

    #[test]
    fn point_outside_every_region_is_unattributed() {
        let index = index();
        assert!(index.classify(5.0, 5.0).is_none());
        assert_eq!(
            index.attribute(Coordinate::new(-3.0, 0.5)),
            Attribution::Unattributed
        );
    }

    #[test]
    fn point_on_shared_edge_is_not_contained() {
        let index = index();
        assert!(index.classify(1.0, 0.5).is_none());
    }

    #[test]
    fn non_finite_coordinates_never_match() {
        let index = index();
        assert!(index.classify(f64::NAN, 0.5).is_none());
        assert!(index.classify(0.5, f64::INFINITY).is_none());
    }

    #[test]
    fn overlapping_regions_resolve_to_first_in_input() {
        let index = RegionIndex::build(vec![
            Region::new("First", "A", square(0.0, 0.0, 2.0)),
            Region::new("Second", "B", square(0.5, 0.5, 2.0)),
        ]);
        for _ in 0..10 {
            assert_eq!(index.classify(1.0, 1.0).unwrap().fine, "First");
        }
        assert_eq!(index.classify(2.25, 2.25).unwrap().fine, "Second");
    }

    #[test]
    fn attribute_wraps_classification() {
        let index = index();
        let attribution = index.attribute(Coordinate::new(0.5, -0.5));
        assert_eq!(
            attribution.labels().map(|l| l.fine),
            Some("Park Slope"),
            "expected Park Slope, got {attribution:?}"
        );
    }

    #[test]
    fn reports_size_and_boroughs() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert_eq!(
            index.coarse_labels().into_iter().collect::<Vec<_>>(),
            vec!["Brooklyn", "Manhattan", "Queens"]
        );
        assert!(RegionIndex::build(Vec::new()).is_empty());
        assert!(
            RegionIndex::build(vec![Region::new("Void", "Nowhere", MultiPolygon(vec![]))])
                .is_empty()
        );
    }
}
