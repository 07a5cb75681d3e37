//! Sampling of one configured data source over the whole network

use geo::{BoundingRect, Coord, MultiLineString, Rect};
use hashbrown::HashMap;
use log::info;

use super::{
    RasterGrid, SamplingOptions, TransformRegistry, apply_chunked, rasterize, sample_network,
};
use crate::Error;
use crate::config::{DataSourceConfig, DataSourceKind};
use crate::loading::{read_ascii_grid, read_vector_layer};
use crate::model::{SegmentId, SegmentedNetwork};

/// Loads the measurement field of `source` and samples it along every segment.
/// Segments without any valued sample point are absent from the result.
///
/// # Errors
///
/// Returns an error if the source file cannot be read or parsed, if its
/// transform is not registered, or if a vector layer has nothing to rasterize.
pub fn sample_data_source(
    network: &SegmentedNetwork,
    source: &DataSourceConfig,
    registry: &TransformRegistry,
    parallel: bool,
) -> Result<HashMap<SegmentId, f64>, Error> {
    if !source.path.exists() {
        return Err(Error::Configuration(format!(
            "Data source '{}' not found at {}",
            source.name,
            source.path.display()
        )));
    }

    let field = match source.kind {
        DataSourceKind::Raster => read_ascii_grid(&source.path)?,
        DataSourceKind::Vector => vector_field(network, source, registry, parallel)?,
    };

    let values = sample_network(network, &field, SamplingOptions::from(source));
    info!(
        "Sampled '{}': {} of {} segments received a value",
        source.name,
        values.len(),
        network.len()
    );
    Ok(values)
}

fn vector_field(
    network: &SegmentedNetwork,
    source: &DataSourceConfig,
    registry: &TransformRegistry,
    parallel: bool,
) -> Result<RasterGrid, Error> {
    let mut features = read_vector_layer(&source.path, &source.value_column)?;

    if let Some(name) = &source.transform {
        let transform = registry.get(name)?;
        let before = features.len();
        features = if parallel {
            apply_chunked(features, transform)
        } else {
            features.into_iter().filter_map(transform).collect()
        };
        info!(
            "Transform '{name}' kept {} of {before} features of '{}'",
            features.len(),
            source.name
        );
    }

    let clip = network_extent(network).map(|extent| expand(extent, source.resolution));
    rasterize(&features, source.resolution, clip)
}

/// Bounding box of every segment geometry
pub fn network_extent(network: &SegmentedNetwork) -> Option<Rect<f64>> {
    network
        .iter()
        .map(|segment| segment.geometry.clone())
        .collect::<MultiLineString<f64>>()
        .bounding_rect()
}

fn expand(rect: Rect<f64>, margin: f64) -> Rect<f64> {
    let margin = Coord {
        x: margin,
        y: margin,
    };
    Rect::new(rect.min() - margin, rect.max() + margin)
}
