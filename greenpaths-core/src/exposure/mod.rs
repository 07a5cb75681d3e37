//! Aggregation of segment values into per-route exposure statistics

mod aggregator;
mod cache;
mod output;
mod ranges;
mod statistics;

pub use aggregator::{
    AggregationSummary, ExposureAggregator, ExposureSink, RouteSource, SegmentLookup, batch_size,
};
pub use cache::SegmentCache;
pub use output::{BASE_COLUMNS, ExposureTable, output_path};
pub use ranges::{OTHER_RANGE, ValueRange, classify_cumulative};
pub use statistics::{ExposureSource, TravelTimes, aggregate_route, source_statistics};
