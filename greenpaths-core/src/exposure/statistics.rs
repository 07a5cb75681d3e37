//! Statistics of one route computed from cached segment rows

use std::collections::BTreeMap;

use geo::MultiLineString;
use hashbrown::HashMap;

use super::{SegmentCache, ValueRange, classify_cumulative};
use crate::model::{PathExposureStatistics, RouteRecord, SegmentId, SourceStatistics};

/// Measurement source aggregated along routes
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSource {
    pub name: String,
    pub ranges: Option<Vec<ValueRange>>,
}

impl ExposureSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ranges: None,
        }
    }

    #[must_use]
    pub fn with_ranges(mut self, ranges: Vec<ValueRange>) -> Self {
        self.ranges = Some(ranges);
        self
    }
}

/// Segment travel times reported by the routing engine, with a walking speed
/// fallback for segments it did not report
#[derive(Debug, Clone)]
pub struct TravelTimes {
    times: HashMap<SegmentId, f64>,
    default_speed_mps: f64,
}

impl TravelTimes {
    pub fn new(times: HashMap<SegmentId, f64>, default_speed_mps: f64) -> Self {
        Self {
            times,
            default_speed_mps,
        }
    }

    /// Seconds needed to traverse a segment of the given length
    pub fn get(&self, segment_id: SegmentId, length: f64) -> f64 {
        self.times
            .get(&segment_id)
            .copied()
            .unwrap_or(length / self.default_speed_mps)
    }
}

/// Min, max, time weighted sum and average of `(value, time)` pairs, or
/// `None` for an empty slice
pub fn source_statistics(
    pairs: &[(f64, f64)],
    ranges: Option<&[ValueRange]>,
) -> Option<SourceStatistics> {
    let min = pairs.iter().map(|&(value, _)| value).reduce(f64::min)?;
    let max = pairs.iter().map(|&(value, _)| value).reduce(f64::max)?;
    let weighted_sum: f64 = pairs.iter().map(|&(value, time)| value * time).sum();
    let total_time: f64 = pairs.iter().map(|&(_, time)| time).sum();
    let time_weighted_average = if total_time == 0.0 {
        0.0
    } else {
        weighted_sum / total_time
    };

    Some(SourceStatistics {
        min,
        max,
        time_weighted_average,
        time_weighted_sum: weighted_sum,
        cumulative_time_by_range: ranges.map(|ranges| classify_cumulative(pairs, ranges)),
    })
}

/// Aggregates one route. Segments missing from the cache are skipped, sources
/// without any valued segment are left out. Returns `None` for routes without
/// a path and for routes where no source has a value.
pub fn aggregate_route(
    route: &RouteRecord,
    cache: &SegmentCache,
    sources: &[ExposureSource],
    travel_times: &TravelTimes,
    keep_geometry: bool,
) -> Option<PathExposureStatistics> {
    let path = route.path()?;
    let resolved: Vec<_> = path
        .iter()
        .filter_map(|&segment_id| cache.get(segment_id))
        .map(|row| (row, travel_times.get(row.segment_id, row.length)))
        .collect();

    let mut statistics = BTreeMap::new();
    for source in sources {
        let pairs: Vec<(f64, f64)> = resolved
            .iter()
            .filter_map(|(row, time)| row.values.get(&source.name).map(|&value| (value, *time)))
            .collect();
        if let Some(stats) = source_statistics(&pairs, source.ranges.as_deref()) {
            statistics.insert(source.name.clone(), stats);
        }
    }
    if statistics.is_empty() {
        return None;
    }

    let geometry = keep_geometry.then(|| {
        MultiLineString::new(
            resolved
                .iter()
                .filter_map(|(row, _)| row.geometry.clone())
                .collect(),
        )
    });

    Some(PathExposureStatistics {
        from_id: route.from_id.clone(),
        to_id: route.to_id.clone(),
        user_id: route.user_id.clone(),
        config_name: route.config_name.clone(),
        length: resolved.iter().map(|(row, _)| row.length).sum(),
        travel_time: resolved.iter().map(|(_, time)| time).sum(),
        geometry,
        sources: statistics,
    })
}
