//! This module is responsible for loading data from various sources (OSM,
//! rasters, vector layers, routing results) and turning them into the
//! typed inputs of the exposure pipeline.

pub mod osm;
mod raster;
mod routes;
mod vector;

pub use raster::{parse_ascii_grid, read_ascii_grid};
pub use routes::{CsvRouteSource, parse_segment_ids, read_travel_times};
pub use vector::{parse_vector_layer, read_vector_layer};
