use std::collections::BTreeMap;

use hashbrown::HashMap;
use log::{info, warn};

use super::SegmentRow;
use crate::Error;
use crate::config::{DataSourceConfig, normalized_key};
use crate::model::{SegmentId, SegmentedNetwork};

/// Declared value range and polarity of one measurement source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBounds {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub good_exposure: bool,
}

impl From<&DataSourceConfig> for SourceBounds {
    fn from(source: &DataSourceConfig) -> Self {
        Self {
            name: source.name.clone(),
            min: source.min,
            max: source.max,
            good_exposure: source.good_exposure,
        }
    }
}

/// Stored raw value lying outside its source's declared bounds
#[derive(Debug, Clone, PartialEq)]
pub struct BoundViolation {
    pub segment_id: SegmentId,
    pub source: String,
    pub value: f64,
}

/// Master table of per-segment measurement values.
///
/// Every row holds the raw value of each source under the source name and its
/// routing weight under `{source}_normalized`. Good exposure sources produce
/// weights in `[-1, 0]`, all others in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentValueStore {
    rows: BTreeMap<SegmentId, SegmentRow>,
}

impl SegmentValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store of the given rows, as reloaded from the persisted table
    pub fn from_rows(rows: impl IntoIterator<Item = SegmentRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.segment_id, row)).collect(),
        }
    }

    /// Creates a row with geometry and length for every segment of the network.
    /// Existing values are kept.
    pub fn register_segments(&mut self, network: &SegmentedNetwork) {
        for segment in network.iter() {
            let row = self
                .rows
                .entry(segment.segment_id)
                .or_insert_with(|| SegmentRow::empty(segment.segment_id));
            row.length = segment.length();
            row.geometry = Some(segment.geometry.clone());
        }
    }

    /// Replaces the values of `source` with `values`. Segments not seen before
    /// get an empty row. Calling this again with the same input leaves the
    /// store unchanged.
    pub fn save_segment_values(&mut self, values: &HashMap<SegmentId, f64>, source: &str) {
        let normalized = normalized_key(source);
        for row in self.rows.values_mut() {
            row.values.remove(source);
            row.values.remove(&normalized);
        }

        for (&segment_id, &value) in values {
            self.rows
                .entry(segment_id)
                .or_insert_with(|| SegmentRow::empty(segment_id))
                .values
                .insert(source.to_string(), value);
        }
        info!("Stored {} values of '{source}'", values.len());
    }

    /// Percentage of `total_segments` carrying a value of `source`
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self, source: &str, total_segments: usize) -> f64 {
        if total_segments == 0 {
            return 0.0;
        }
        let covered = self
            .rows
            .values()
            .filter(|row| row.values.contains_key(source))
            .count();
        100.0 * covered as f64 / total_segments as f64
    }

    /// Checks that every source covers at least `safety_percentage` percent of
    /// the network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataCoverage`] for the first source below the threshold.
    pub fn validate_data_coverage(
        &self,
        sources: &[&str],
        total_segments: usize,
        safety_percentage: f64,
    ) -> Result<(), Error> {
        for &source in sources {
            let coverage = self.coverage(source, total_segments);
            if coverage < safety_percentage {
                return Err(Error::DataCoverage {
                    source_name: source.to_string(),
                    coverage,
                    required: safety_percentage,
                });
            }
            info!("'{source}' covers {coverage:.1}% of {total_segments} segments");
        }
        Ok(())
    }

    /// Reports raw values outside the declared bounds. Never fails.
    pub fn validate_user_min_max_values(&self, sources: &[SourceBounds]) -> Vec<BoundViolation> {
        let mut violations = Vec::new();
        for bounds in sources {
            let before = violations.len();
            violations.extend(self.rows.values().filter_map(|row| {
                let value = *row.values.get(&bounds.name)?;
                (value < bounds.min || value > bounds.max).then(|| BoundViolation {
                    segment_id: row.segment_id,
                    source: bounds.name.clone(),
                    value,
                })
            }));

            let found = violations.len() - before;
            if found > 0 {
                warn!(
                    "{found} values of '{}' lie outside the declared range [{}, {}] and will be clipped",
                    bounds.name, bounds.min, bounds.max
                );
            }
        }
        violations
    }

    /// Computes the routing weight of every raw value: clipped to the declared
    /// bounds, scaled to `[0, 1]` and negated for good exposure sources.
    pub fn save_normalized_values_to_store(&mut self, sources: &[SourceBounds]) {
        for bounds in sources {
            let key = normalized_key(&bounds.name);
            let mut count = 0;
            for row in self.rows.values_mut() {
                row.values.remove(&key);
                if let Some(&raw) = row.values.get(&bounds.name) {
                    row.values.insert(key.clone(), normalize(raw, bounds));
                    count += 1;
                }
            }
            info!("Normalized {count} values of '{}'", bounds.name);
        }
    }

    /// `{segment_id: normalized_cost}` input of the routing engine
    pub fn edge_costs(&self, source: &str) -> HashMap<SegmentId, f64> {
        let key = normalized_key(source);
        self.rows
            .values()
            .filter_map(|row| row.values.get(&key).map(|&cost| (row.segment_id, cost)))
            .collect()
    }

    pub fn value(&self, segment_id: SegmentId, key: &str) -> Option<f64> {
        self.rows.get(&segment_id)?.values.get(key).copied()
    }

    pub fn row(&self, segment_id: SegmentId) -> Option<&SegmentRow> {
        self.rows.get(&segment_id)
    }

    /// Rows of the given ids, unknown ids are skipped
    pub fn select_rows_by_id(&self, ids: &[SegmentId]) -> Vec<SegmentRow> {
        ids.iter()
            .filter_map(|id| self.rows.get(id))
            .cloned()
            .collect()
    }

    /// Flattened table ordered by segment id
    pub fn to_rows(&self) -> Vec<SegmentRow> {
        self.rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn normalize(raw: f64, bounds: &SourceBounds) -> f64 {
    let clamped = raw.clamp(bounds.min, bounds.max);
    let scaled = ((clamped - bounds.min) / (bounds.max - bounds.min)).clamp(0.0, 1.0);
    if bounds.good_exposure { -scaled } else { scaled }
}
