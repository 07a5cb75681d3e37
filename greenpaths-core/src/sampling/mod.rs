//! Spatial sampling of measurement fields along network segments
//!
//! Raster sources are sampled directly. Vector sources are rasterized at the
//! configured resolution first, so both kinds share the same point sampling
//! and aggregation path.

mod field;
pub mod parallel;
mod rasterize;
mod sampler;
mod source;
mod transforms;

pub use field::{GridTransform, MeasurementField, RasterGrid};
pub use parallel::{apply_chunked, chunk_count};
pub use rasterize::{VectorFeature, rasterize};
pub use sampler::{
    AggregationMethod, SampleCount, SamplingOptions, VALUE_PRECISION, round_to,
    sample_geometry_value, sample_multi_line, sample_network, sample_points,
};
pub use source::{network_extent, sample_data_source};
pub use transforms::{FeatureTransform, TransformRegistry};
