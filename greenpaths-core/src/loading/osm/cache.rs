//! On-disk cache of segmented networks
//!
//! A segmented network is stored as a `GeoJSON` `FeatureCollection`, one
//! `LineString` feature per segment carrying its id, parent way, node
//! references and tags.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use geo::LineString;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value as GeoJsonValue};
use log::{info, warn};
use serde_json::{Value as JsonValue, json};

use super::{NetworkProjection, read_raw_network, segment_network};
use crate::Error;
use crate::model::{Segment, SegmentedNetwork};

/// Cache file name derived from the extract name, the synthetic id base and
/// the projection of the node coordinates
pub fn cache_path(
    cache_dir: &Path,
    osm_path: &Path,
    id_base: i64,
    projection: NetworkProjection,
) -> PathBuf {
    let stem = osm_path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or("network", |name| name.split('.').next().unwrap_or(name));
    cache_dir.join(format!(
        "{stem}_segmented_{id_base}_epsg{}.geojson",
        projection.epsg()
    ))
}

/// Loads the segmented network from the cache, segmenting the extract first
/// if no cached output exists yet. The cache is only written after a
/// successful segmentation.
pub fn load_or_segment(
    osm_path: &Path,
    cache_dir: &Path,
    id_base: i64,
    projection: NetworkProjection,
) -> Result<SegmentedNetwork, Error> {
    let path = cache_path(cache_dir, osm_path, id_base, projection);
    if path.exists() {
        info!("Using cached segmented network {}", path.display());
        return read_segmented_network(&path);
    }

    if !osm_path.exists() {
        return Err(Error::Configuration(format!(
            "OSM file not found: {}",
            osm_path.display()
        )));
    }

    let raw = read_raw_network(osm_path, projection)?;
    let network = segment_network(&raw, id_base)?;
    drop(raw);
    release_unused_memory();

    fs::create_dir_all(cache_dir)?;
    write_segmented_network(&network, &path)?;
    info!("Cached segmented network to {}", path.display());

    Ok(network)
}

/// Returns freed heap memory to the system after the protobuf decoding.
fn release_unused_memory() {
    // # Safety
    //
    // `malloc_trim` is only called on linux with glibc, checked by the cfg
    // attribute at compile time.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        if libc::malloc_trim(0) == 0 {
            log::debug!("No heap memory could be trimmed");
        } else {
            log::debug!("Trimmed unused heap memory");
        }
    }
}

pub fn write_segmented_network(network: &SegmentedNetwork, path: &Path) -> Result<(), Error> {
    let features = network
        .iter()
        .map(segment_to_feature)
        .collect::<Result<Vec<_>, _>>()?;

    let collection = FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    };

    // Written next to the target, then renamed into place
    let tmp_path = path.with_extension("geojson.tmp");
    fs::write(&tmp_path, serde_json::to_string(&collection)?)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_segmented_network(path: &Path) -> Result<SegmentedNetwork, Error> {
    let content = fs::read_to_string(path)?;
    let geojson = content
        .parse::<GeoJson>()
        .map_err(|e| Error::GeoJsonError(e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(Error::GeoJsonError(format!(
            "{} is not a FeatureCollection",
            path.display()
        )));
    };

    let segments = collection
        .features
        .into_iter()
        .map(feature_to_segment)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SegmentedNetwork { segments })
}

fn segment_to_feature(segment: &Segment) -> Result<Feature, Error> {
    let properties = json!({
        "segment_id": segment.segment_id,
        "parent_way_id": segment.parent_way_id,
        "nodes": segment.nodes,
        "tags": segment.tags,
    });
    let JsonValue::Object(properties) = properties else {
        return Err(Error::InvalidData(format!(
            "Segment {} properties are not an object",
            segment.segment_id
        )));
    };

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoJsonValue::from(&segment.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

fn feature_to_segment(feature: Feature) -> Result<Segment, Error> {
    let integer = |key: &str| {
        feature
            .property(key)
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| Error::InvalidData(format!("Cached segment lacks '{key}'")))
    };
    let segment_id = integer("segment_id")?;
    let parent_way_id = integer("parent_way_id")?;

    let nodes: Vec<i64> = feature
        .property("nodes")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();

    let tags: BTreeMap<String, String> = feature
        .property("tags")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();

    let geometry = match feature.geometry {
        Some(geometry) => geo::Geometry::<f64>::try_from(geometry)
            .map_err(|e| Error::GeoJsonError(e.to_string()))?,
        None => {
            return Err(Error::InvalidData(format!(
                "Cached segment {segment_id} has no geometry"
            )));
        }
    };

    let geometry: LineString<f64> = match geometry {
        geo::Geometry::LineString(line) => line,
        other => {
            warn!("Cached segment {segment_id} is not a LineString");
            return Err(Error::InvalidData(format!(
                "Cached segment {segment_id} has unexpected geometry {other:?}"
            )));
        }
    };

    Ok(Segment {
        segment_id,
        parent_way_id,
        nodes,
        geometry,
        tags,
    })
}
