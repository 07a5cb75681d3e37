//! Rasterization of polygon layers
//!
//! Vector sources are burned into a [`RasterGrid`] so they can be sampled
//! exactly like raster sources. Where polygons overlap the highest value wins,
//! which is the result of painting the features in ascending value order.

use geo::{BoundingRect, Contains, Coord, MultiPolygon, Point, Rect};
use log::debug;
use rayon::prelude::*;
use rstar::{AABB, Envelope, RTree, RTreeObject};

use super::RasterGrid;
use crate::Error;

/// Polygon feature with the measurement value it carries
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub geometry: MultiPolygon<f64>,
    pub value: f64,
}

struct IndexedFeature<'a> {
    feature: &'a VectorFeature,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Burns `features` into a grid with `resolution` sized cells. The grid covers
/// the features' extent, limited to `clip` when given.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for an empty layer or a non-positive resolution.
pub fn rasterize(
    features: &[VectorFeature],
    resolution: f64,
    clip: Option<Rect<f64>>,
) -> Result<RasterGrid, Error> {
    let indexed: Vec<IndexedFeature> = features
        .iter()
        .filter(|feature| feature.value.is_finite())
        .filter_map(|feature| {
            feature.geometry.bounding_rect().map(|rect| IndexedFeature {
                feature,
                envelope: envelope_of(rect),
            })
        })
        .collect();

    let layer_extent = indexed
        .iter()
        .map(|item| item.envelope)
        .reduce(|a, b| a.merged(&b))
        .ok_or_else(|| Error::InvalidData("Vector layer has no valued polygons".to_string()))?;

    let extent = match clip.map(envelope_of) {
        // Clip corners pulled into the layer extent
        Some(clip) if layer_extent.intersection_area(&clip) > 0.0 => AABB::from_corners(
            layer_extent.min_point(&clip.lower()),
            layer_extent.min_point(&clip.upper()),
        ),
        Some(clip) => clip,
        None => layer_extent,
    };
    let extent = Rect::new(Coord::from(extent.lower()), Coord::from(extent.upper()));

    let template = RasterGrid::empty(extent, resolution)?;
    let (width, height) = (template.width(), template.height());
    let tree = RTree::bulk_load(indexed);

    let values: Vec<f64> = (0..width * height)
        .into_par_iter()
        .map(|index| {
            let center = template.cell_center(index / width, index % width);
            highest_value_at(&tree, center).unwrap_or(f64::NAN)
        })
        .collect();

    let grid = RasterGrid::new(template.transform(), width, height, values)?;
    debug!(
        "Rasterized {} features into {width}x{height} cells, {} with data",
        features.len(),
        grid.data_cell_count()
    );
    Ok(grid)
}

fn highest_value_at(tree: &RTree<IndexedFeature<'_>>, coord: Coord<f64>) -> Option<f64> {
    let point = Point::from(coord);
    tree.locate_in_envelope_intersecting(&AABB::from_point([coord.x, coord.y]))
        .filter(|item| item.feature.geometry.contains(&point))
        .map(|item| item.feature.value)
        .reduce(f64::max)
}

fn envelope_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}
