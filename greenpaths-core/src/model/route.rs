use serde::{Deserialize, Serialize};

use super::SegmentId;

/// Output of the external routing engine for one origin-destination pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub from_id: String,
    pub to_id: String,
    pub user_id: String,
    pub config_name: String,
    /// `None` when the router reported a malformed list, empty when no path was found
    pub segment_ids: Option<Vec<SegmentId>>,
}

impl RouteRecord {
    pub fn new(from_id: &str, to_id: &str, segment_ids: Vec<SegmentId>) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            user_id: String::new(),
            config_name: String::new(),
            segment_ids: Some(segment_ids),
        }
    }

    /// Segment ids of a found path, `None` for "no path found"
    pub fn path(&self) -> Option<&[SegmentId]> {
        self.segment_ids
            .as_deref()
            .filter(|segment_ids| !segment_ids.is_empty())
    }
}
