use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;
use std::path::Path;

use geo::Coord;
use hashbrown::{HashMap, HashSet};
use log::{debug, info};
use osmpbf::{Element, ElementReader};

use crate::Error;
use crate::config::is_geographic_crs;
use crate::model::{NodeRef, RawNetwork, RawWay};

const EARTH_RADIUS_M: f64 = 6_378_137.0;
/// First eccentricity of the WGS84 ellipsoid
const WGS84_ECCENTRICITY: f64 = 0.081_819_190_842_622;

/// Metric coordinate system node positions are projected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProjection {
    /// Spherical web mercator metres
    WebMercator,
    /// Ellipsoidal world mercator metres
    WorldMercator,
}

impl NetworkProjection {
    /// Resolves the projection for a configured crs code
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for geographic crs codes, whose degree
    /// units cannot serve as segment lengths, and for codes nodes cannot be
    /// projected to.
    pub fn from_crs(crs: &str) -> Result<Self, Error> {
        if is_geographic_crs(crs) {
            return Err(Error::Configuration(format!(
                "{crs} is geographic, segment lengths and sampling resolutions \
                 need a metric crs such as EPSG:3857"
            )));
        }
        match crs.trim().to_ascii_uppercase().as_str() {
            "EPSG:3857" | "EPSG:900913" => Ok(Self::WebMercator),
            "EPSG:3395" => Ok(Self::WorldMercator),
            other => Err(Error::Configuration(format!(
                "Street network nodes cannot be projected to {other}, \
                 use EPSG:3857 or EPSG:3395"
            ))),
        }
    }

    /// EPSG code, part of the segmented network cache key
    pub fn epsg(self) -> u32 {
        match self {
            Self::WebMercator => 3857,
            Self::WorldMercator => 3395,
        }
    }

    pub fn project(self, lon: f64, lat: f64) -> Coord<f64> {
        let phi = lat.to_radians();
        let x = EARTH_RADIUS_M * lon.to_radians();
        let y = match self {
            Self::WebMercator => EARTH_RADIUS_M * (FRAC_PI_4 + phi / 2.0).tan().ln(),
            Self::WorldMercator => {
                let e_sin = WGS84_ECCENTRICITY * phi.sin();
                let correction = ((1.0 - e_sin) / (1.0 + e_sin)).powf(WGS84_ECCENTRICITY / 2.0);
                EARTH_RADIUS_M * ((FRAC_PI_4 + phi / 2.0).tan() * correction).ln()
            }
        };
        Coord { x, y }
    }
}

/// Reads every `highway=*` way and the coordinates of the nodes they use
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read_raw_network(path: &Path, projection: NetworkProjection) -> Result<RawNetwork, Error> {
    info!("Reading street network from {}", path.display());
    let reader = ElementReader::from_path(path)?;

    let mut all_nodes: HashMap<NodeRef, Coord<f64>> = HashMap::new();
    let mut ways = Vec::new();

    reader.for_each(|element| match element {
        Element::Node(node) => {
            all_nodes.insert(node.id(), projection.project(node.lon(), node.lat()));
        }
        Element::DenseNode(node) => {
            all_nodes.insert(node.id(), projection.project(node.lon(), node.lat()));
        }
        Element::Way(way) => {
            let tags: BTreeMap<String, String> = way
                .tags()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            if tags.contains_key("highway") {
                ways.push(RawWay {
                    id: way.id(),
                    nodes: way.refs().collect(),
                    tags,
                });
            }
        }
        _ => {}
    })?;

    // Keep only coordinates referenced by street ways
    let used: HashSet<NodeRef> = ways.iter().flat_map(|w| w.nodes.iter().copied()).collect();
    let node_coords: HashMap<NodeRef, Coord<f64>> = all_nodes
        .into_iter()
        .filter(|(id, _)| used.contains(id))
        .collect();

    debug!(
        "Read {} street ways referencing {} nodes",
        ways.len(),
        node_coords.len()
    );

    Ok(RawNetwork { ways, node_coords })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_from_crs() {
        assert_eq!(
            NetworkProjection::from_crs("epsg:3857").unwrap(),
            NetworkProjection::WebMercator
        );
        assert_eq!(
            NetworkProjection::from_crs("EPSG:3395").unwrap(),
            NetworkProjection::WorldMercator
        );
        assert!(NetworkProjection::from_crs("EPSG:3879").is_err());
    }

    #[test]
    fn test_geographic_crs_is_rejected() {
        for crs in ["EPSG:4326", "wgs84"] {
            match NetworkProjection::from_crs(crs) {
                Err(Error::Configuration(message)) => assert!(message.contains("geographic")),
                other => panic!("Expected a configuration error for {crs}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_world_mercator_is_ellipsoidal() {
        let web = NetworkProjection::WebMercator.project(24.9, 60.17);
        let world = NetworkProjection::WorldMercator.project(24.9, 60.17);
        assert!((web.x - world.x).abs() < 1e-6);
        // The ellipsoid pulls northern latitudes towards the equator
        assert!(world.y < web.y);
        assert!((web.y - world.y) > 30_000.0 && (web.y - world.y) < 40_000.0);
        assert_eq!(NetworkProjection::WorldMercator.epsg(), 3395);
    }

    #[test]
    fn test_web_mercator_origin_and_scale() {
        let origin = NetworkProjection::WebMercator.project(0.0, 0.0);
        assert!(origin.x.abs() < 1e-6 && origin.y.abs() < 1e-6);

        let east = NetworkProjection::WebMercator.project(180.0, 0.0);
        assert!((east.x - 20_037_508.342_789_244).abs() < 1e-3);
    }
}
