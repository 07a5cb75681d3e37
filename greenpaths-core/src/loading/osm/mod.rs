//! OSM pbf processing and network segmentation

mod cache;
mod reader;
mod segmenter;

pub use cache::{cache_path, load_or_segment, read_segmented_network, write_segmented_network};
pub use reader::{NetworkProjection, read_raw_network};
pub use segmenter::segment_network;
