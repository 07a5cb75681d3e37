// Re-export key components
pub use crate::config::{
    AggregationConfig, DataSourceConfig, DataSourceKind, GreenPathsConfig, OutputConfig,
    OutputFormat,
};
pub use crate::exposure::{
    AggregationSummary, ExposureAggregator, ExposureSink, ExposureSource, ExposureTable,
    RouteSource, SegmentLookup, TravelTimes, ValueRange, classify_cumulative,
};
pub use crate::loading::osm::{NetworkProjection, load_or_segment, segment_network};
pub use crate::loading::{CsvRouteSource, read_travel_times};
pub use crate::model::{
    PathExposureStatistics, RawNetwork, RawWay, RouteRecord, Segment, SegmentedNetwork,
    SourceStatistics,
};
pub use crate::sampling::{AggregationMethod, TransformRegistry, sample_data_source};
pub use crate::store::{SegmentValueStore, SourceBounds};

pub use crate::Error;
pub use crate::SegmentId;
