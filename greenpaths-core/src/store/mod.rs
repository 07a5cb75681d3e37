//! Per-segment measurement values: storage, validation, normalization and
//! the flat table exchanged with persistence and the routing engine.

mod table;
mod value_store;

pub use table::{
    GEOMETRY_COLUMN, LENGTH_COLUMN, SEGMENT_ID_COLUMN, SegmentRow, read_csv, write_csv,
};
pub use value_store::{BoundViolation, SegmentValueStore, SourceBounds};
