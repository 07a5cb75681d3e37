//! `GeoJSON` polygon layers

use std::fs;
use std::path::Path;

use geo::{MultiPolygon, Polygon};
use geojson::{Feature, GeoJson};
use log::{debug, warn};

use crate::Error;
use crate::sampling::VectorFeature;

/// Reads the (multi)polygon features of a `FeatureCollection` together with the
/// numeric property `value_column`. Features without a polygon geometry or a
/// numeric value are skipped.
pub fn read_vector_layer(path: &Path, value_column: &str) -> Result<Vec<VectorFeature>, Error> {
    let content = fs::read_to_string(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to open vector layer '{}': {e}", path.display()),
        )
    })?;
    let features = parse_vector_layer(&content, value_column)?;
    debug!(
        "Read {} polygon features from {}",
        features.len(),
        path.display()
    );
    Ok(features)
}

pub fn parse_vector_layer(content: &str, value_column: &str) -> Result<Vec<VectorFeature>, Error> {
    let geojson = content
        .parse::<GeoJson>()
        .map_err(|e| Error::GeoJsonError(e.to_string()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(Error::GeoJsonError(
                "Vector layer must contain features".to_string(),
            ));
        }
    };

    let total = features.len();
    let parsed: Vec<VectorFeature> = features
        .into_iter()
        .filter_map(|feature| to_vector_feature(feature, value_column))
        .collect();

    if parsed.len() < total {
        warn!(
            "Skipped {} of {total} features without polygon geometry or numeric '{value_column}'",
            total - parsed.len()
        );
    }

    Ok(parsed)
}

fn to_vector_feature(feature: Feature, value_column: &str) -> Option<VectorFeature> {
    let value = feature.property(value_column).and_then(|v| v.as_f64())?;
    let geometry = geo::Geometry::<f64>::try_from(feature.geometry?).ok()?;
    let geometry = match geometry {
        geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        geo::Geometry::MultiPolygon(multi) => multi,
        geo::Geometry::Rect(rect) => MultiPolygon::new(vec![Polygon::from(rect)]),
        _ => return None,
    };
    Some(VectorFeature { geometry, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYER: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
                "properties": {"value": 0.8}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [1, 1]},
                "properties": {"value": 0.3}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]},
                "properties": {"value": "high"}
            }
        ]
    }"#;

    #[test]
    fn test_polygons_with_numeric_values_are_kept() {
        let features = parse_vector_layer(LAYER, "value").unwrap();
        assert_eq!(features.len(), 1);
        assert!((features[0].value - 0.8).abs() < f64::EPSILON);
        assert_eq!(features[0].geometry.0.len(), 1);
    }

    #[test]
    fn test_other_value_column() {
        assert!(parse_vector_layer(LAYER, "noise").unwrap().is_empty());
    }
}
