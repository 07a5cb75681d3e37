//! Street network components - raw ways and atomic segments

use std::collections::BTreeMap;

use geo::{Coord, Euclidean, Length, LineString};

/// OSM node reference
pub type NodeRef = i64;

/// Identifier of a network segment. Segments that keep their parent way
/// unchanged reuse the way id, split segments get negative synthetic ids.
pub type SegmentId = i64;

/// Tag key carrying the id of the way a segment was cut from
pub const PARENT_WAY_TAG: &str = "parent_way_id";

/// Ordered node sequence with tags, as read from the way-graph extract
#[derive(Debug, Clone, Default)]
pub struct RawWay {
    pub id: i64,
    pub nodes: Vec<NodeRef>,
    pub tags: BTreeMap<String, String>,
}

/// Ways plus the coordinates of every node they reference
#[derive(Debug, Clone, Default)]
pub struct RawNetwork {
    pub ways: Vec<RawWay>,
    pub node_coords: hashbrown::HashMap<NodeRef, Coord<f64>>,
}

/// Atomic, intersection-free piece of the street network
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub segment_id: SegmentId,
    pub parent_way_id: i64,
    pub nodes: Vec<NodeRef>,
    pub geometry: LineString<f64>,
    pub tags: BTreeMap<String, String>,
}

impl Segment {
    /// Planar length in CRS units
    pub fn length(&self) -> f64 {
        Euclidean.length(&self.geometry)
    }

    /// Whether the segment was produced by cutting its parent way
    pub fn is_synthetic(&self) -> bool {
        self.segment_id != self.parent_way_id
    }
}

/// Output of the segmenter
#[derive(Debug, Clone, Default)]
pub struct SegmentedNetwork {
    pub segments: Vec<Segment>,
}

impl SegmentedNetwork {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }
}
