//! Exposure preprocessing and aggregation for green path routing.
//!
//! The street network is cut into intersection-free segments, measurement
//! sources (air quality, greenery, noise) are sampled along every segment and
//! normalized into routing weights, and the routes returned by an external
//! routing engine are aggregated into per-route exposure statistics.

pub mod config;
pub mod error;
pub mod exposure;
pub mod loading;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod sampling;
pub mod store;

pub use error::Error;
pub use model::SegmentId;
