//! `GeoJSON` region source.
//!
//! Reads a `FeatureCollection` of taxi zone polygons. Each feature carries
//! its zone and borough names as properties; the property keys are
//! configurable because published zone files disagree on naming.

use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};

use crate::{Region, SpatialError};

/// Names of the `GeoJSON` feature properties holding the region labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelProperties {
    /// Property holding the fine label (zone name).
    pub fine: String,
    /// Property holding the coarse label (borough name).
    pub coarse: String,
}

impl Default for LabelProperties {
    fn default() -> Self {
        Self {
            fine: "zone".to_string(),
            coarse: "borough".to_string(),
        }
    }
}

/// Reads regions from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or parsed, or if no
/// feature yields a usable region.
pub fn read_regions(
    path: &Path,
    properties: &LabelProperties,
) -> Result<Vec<Region>, SpatialError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SpatialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_regions(&contents, properties)
}

/// Parses regions from a `GeoJSON` `FeatureCollection` string.
///
/// Features without a polygonal geometry or without both label properties
/// are skipped with a warning.
///
/// # Errors
///
/// Returns [`SpatialError`] if the input is not a `FeatureCollection` or no
/// feature yields a usable region.
pub fn parse_regions(
    geojson_str: &str,
    properties: &LabelProperties,
) -> Result<Vec<Region>, SpatialError> {
    let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
        return Err(SpatialError::Invalid {
            message: "expected a GeoJSON FeatureCollection".to_string(),
        });
    };

    let total = collection.features.len();
    let regions: Vec<Region> = collection
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(i, feature)| feature_to_region(i, feature, properties))
        .collect();

    if regions.is_empty() {
        return Err(SpatialError::Invalid {
            message: format!(
                "none of {total} features had a polygon with '{}' and '{}' properties",
                properties.fine, properties.coarse
            ),
        });
    }

    if regions.len() < total {
        log::warn!("Skipped {} of {total} region features", total - regions.len());
    }

    Ok(regions)
}

fn feature_to_region(i: usize, feature: Feature, properties: &LabelProperties) -> Option<Region> {
    let Some(fine) = label(&feature, &properties.fine) else {
        log::warn!("Feature {i} has no '{}' property, skipping", properties.fine);
        return None;
    };
    let Some(coarse) = label(&feature, &properties.coarse) else {
        log::warn!(
            "Feature {i} ({fine}) has no '{}' property, skipping",
            properties.coarse
        );
        return None;
    };
    let Some(boundary) = feature.geometry.and_then(to_multipolygon) else {
        log::warn!("Failed to parse polygon geometry for region {fine}");
        return None;
    };

    Some(Region {
        fine_label: fine,
        coarse_label: coarse,
        boundary,
    })
}

/// Reads a label property as a string. Numeric properties (e.g. location
/// IDs) are accepted and rendered as text.
fn label(feature: &Feature, key: &str) -> Option<String> {
    let value = feature.property(key)?;
    let text = value
        .as_str()
        .map(|s| s.trim().to_string())
        .or_else(|| value.as_number().map(ToString::to_string))?;
    (!text.is_empty()).then_some(text)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geom: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionIndex;

    const ZONES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "zone": "Midtown", "borough": "Manhattan", "LocationID": 161 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "zone": "Rockaways", "borough": "Queens", "LocationID": 201 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[2.0, 0.0], [3.0, 0.0], [3.0, 1.0], [2.0, 1.0], [2.0, 0.0]]],
                        [[[4.0, 0.0], [5.0, 0.0], [5.0, 1.0], [4.0, 1.0], [4.0, 0.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "zone": "Nameless" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[6.0, 0.0], [7.0, 0.0], [7.0, 1.0], [6.0, 1.0], [6.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "zone": "Pier", "borough": "Brooklyn" },
                "geometry": { "type": "Point", "coordinates": [8.0, 0.5] }
            }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_multipolygons() {
        let regions = parse_regions(ZONES, &LabelProperties::default()).unwrap();
        let names: Vec<&str> = regions.iter().map(|r| r.fine_label.as_str()).collect();
        assert_eq!(names, vec!["Midtown", "Rockaways"]);
        assert_eq!(regions[1].boundary.0.len(), 2);
    }

    #[test]
    fn loaded_multipolygon_matches_every_part() {
        let index = RegionIndex::build(parse_regions(ZONES, &LabelProperties::default()).unwrap());
        assert_eq!(index.classify(2.5, 0.5).unwrap().fine, "Rockaways");
        assert_eq!(index.classify(4.5, 0.5).unwrap().fine, "Rockaways");
        assert!(index.classify(3.5, 0.5).is_none());
        assert!(index.classify(6.5, 0.5).is_none());
    }

    #[test]
    fn numeric_properties_become_labels() {
        let properties = LabelProperties {
            fine: "LocationID".to_string(),
            coarse: "borough".to_string(),
        };
        let regions = parse_regions(ZONES, &properties).unwrap();
        assert_eq!(regions[0].fine_label, "161");
        assert_eq!(regions[1].fine_label, "201");
    }

    #[test]
    fn rejects_non_collection_geojson() {
        let point = r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(matches!(
            parse_regions(point, &LabelProperties::default()),
            Err(SpatialError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_collection_without_usable_regions() {
        let properties = LabelProperties {
            fine: "name".to_string(),
            coarse: "boro".to_string(),
        };
        assert!(matches!(
            parse_regions(ZONES, &properties),
            Err(SpatialError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            parse_regions("{ not json", &LabelProperties::default()),
            Err(SpatialError::GeoJson(_))
        ));
    }
}
