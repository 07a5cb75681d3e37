//! Data model for exposure preprocessing and aggregation
//!
//! Contains types for the street network, route records and route statistics.

pub mod network;
pub mod route;
pub mod statistics;

pub use network::{
    NodeRef, PARENT_WAY_TAG, RawNetwork, RawWay, Segment, SegmentId, SegmentedNetwork,
};
pub use route::RouteRecord;
pub use statistics::{PathExposureStatistics, SourceStatistics, source_columns};
