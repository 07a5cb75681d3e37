use hashbrown::HashMap;
use itertools::Itertools;
use log::trace;

use super::SegmentLookup;
use crate::Error;
use crate::model::{RouteRecord, SegmentId};
use crate::store::SegmentRow;

/// Read-through projection of the segment table holding only the segments
/// referenced by the routes of the current batch
#[derive(Debug, Default)]
pub struct SegmentCache {
    rows: HashMap<SegmentId, SegmentRow>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the segments referenced by `routes` that are not cached yet.
    /// Returns the number of newly fetched rows.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures.
    pub fn warm(&mut self, routes: &[RouteRecord], lookup: &dyn SegmentLookup) -> Result<usize, Error> {
        let missing = routes
            .iter()
            .filter_map(RouteRecord::path)
            .flatten()
            .copied()
            .filter(|id| !self.rows.contains_key(id))
            .sorted_unstable()
            .dedup()
            .collect_vec();
        if missing.is_empty() {
            return Ok(0);
        }

        let rows = lookup.select_rows_by_id(&missing)?;
        let fetched = rows.len();
        trace!("Fetched {fetched} of {} requested segments", missing.len());
        self.rows
            .extend(rows.into_iter().map(|row| (row.segment_id, row)));
        Ok(fetched)
    }

    pub fn get(&self, segment_id: SegmentId) -> Option<&SegmentRow> {
        self.rows.get(&segment_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Records every requested id list
    struct CountingLookup {
        requests: RefCell<Vec<Vec<SegmentId>>>,
    }

    impl SegmentLookup for CountingLookup {
        fn select_rows_by_id(&self, ids: &[SegmentId]) -> Result<Vec<SegmentRow>, Error> {
            self.requests.borrow_mut().push(ids.to_vec());
            Ok(ids
                .iter()
                .filter(|&&id| id != 404)
                .map(|&id| SegmentRow::empty(id))
                .collect())
        }
    }

    #[test]
    fn test_warm_fetches_only_missing_ids() {
        let lookup = CountingLookup {
            requests: RefCell::new(Vec::new()),
        };
        let mut cache = SegmentCache::new();

        let first = vec![
            RouteRecord::new("a", "b", vec![3, 1, 2, 1]),
            RouteRecord::new("a", "c", vec![]),
        ];
        assert_eq!(cache.warm(&first, &lookup).unwrap(), 3);

        let second = vec![RouteRecord::new("b", "c", vec![2, 404, 4])];
        assert_eq!(cache.warm(&second, &lookup).unwrap(), 1);
        assert!(cache.get(404).is_none());

        assert_eq!(
            *lookup.requests.borrow(),
            vec![vec![1, 2, 3], vec![4, 404]]
        );

        cache.clear();
        assert!(cache.is_empty());
    }
}
