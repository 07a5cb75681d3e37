//! Per-route exposure statistics

use std::collections::BTreeMap;

use geo::MultiLineString;
use serde::Serialize;

/// Statistics of one measurement source along one route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatistics {
    pub min: f64,
    pub max: f64,
    pub time_weighted_average: f64,
    pub time_weighted_sum: f64,
    /// Seconds spent per value range, keyed by `"{low}-{high}"` and `"other"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_time_by_range: Option<BTreeMap<String, f64>>,
}

/// One aggregated route
#[derive(Debug, Clone, PartialEq)]
pub struct PathExposureStatistics {
    pub from_id: String,
    pub to_id: String,
    pub user_id: String,
    pub config_name: String,
    pub length: f64,
    pub travel_time: f64,
    pub geometry: Option<MultiLineString<f64>>,
    /// Only sources with at least one valued segment on the route appear here
    pub sources: BTreeMap<String, SourceStatistics>,
}

impl PathExposureStatistics {
    pub fn source(&self, name: &str) -> Option<&SourceStatistics> {
        self.sources.get(name)
    }

    /// Output column names produced by this route, in deterministic order
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.sources.len() * 5);
        for (source, stats) in &self.sources {
            columns.extend(source_columns(source, stats.cumulative_time_by_range.is_some()));
        }
        columns
    }
}

/// Column names of one source's statistics
pub fn source_columns(source: &str, with_ranges: bool) -> Vec<String> {
    let mut columns = vec![
        format!("{source}_min"),
        format!("{source}_max"),
        format!("{source}_avg"),
        format!("{source}_sum"),
    ];
    if with_ranges {
        columns.push(format!("{source}_cumulative"));
    }
    columns
}
