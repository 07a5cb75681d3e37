//! Cumulative time spent in value ranges

use std::collections::BTreeMap;

/// Bucket key for values outside every configured range
pub const OTHER_RANGE: &str = "other";

/// Half-open value range `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

impl ValueRange {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value < self.high
    }

    /// Key of the range in classification results, e.g. `0-10`
    pub fn label(&self) -> String {
        format!("{}-{}", self.low, self.high)
    }
}

/// Accumulates the duration of every `(value, duration)` pair into the first
/// range containing the value. Durations of values outside all ranges go to
/// [`OTHER_RANGE`], which is left out when nothing fell there.
pub fn classify_cumulative(
    pairs: &[(f64, f64)],
    ranges: &[ValueRange],
) -> BTreeMap<String, f64> {
    let mut totals = vec![0.0; ranges.len()];
    let mut other = 0.0;

    for &(value, duration) in pairs {
        match ranges.iter().position(|range| range.contains(value)) {
            Some(index) => totals[index] += duration,
            None => other += duration,
        }
    }

    let mut result = BTreeMap::new();
    for (range, total) in ranges.iter().zip(totals) {
        *result.entry(range.label()).or_insert(0.0) += total;
    }
    if other != 0.0 {
        result.insert(OTHER_RANGE.to_string(), other);
    }
    result
}
