//! Point sampling of measurement fields along segment geometries

use geo::{Coord, Euclidean, InterpolateLine, Length, LineString, MultiLineString};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use serde::Deserialize;

use super::MeasurementField;
use crate::config::DataSourceConfig;
use crate::model::{SegmentId, SegmentedNetwork};

/// Decimal places kept for stored segment values
pub const VALUE_PRECISION: i32 = 3;

/// How point samples of one segment are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Mean,
    Min,
    Max,
}

impl AggregationMethod {
    /// Combines the given values, `None` for an empty slice
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
        }
    }
}

/// Number of sample points per geometry part
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleCount {
    /// One point every `resolution` length units, both ends included
    Resolution(f64),
    Fixed(usize),
}

impl SampleCount {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_length(self, length: f64) -> usize {
        match self {
            Self::Fixed(count) => count.max(1),
            Self::Resolution(resolution) => (length / resolution).ceil().max(0.0) as usize + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub count: SampleCount,
    pub method: AggregationMethod,
}

impl From<&DataSourceConfig> for SamplingOptions {
    fn from(source: &DataSourceConfig) -> Self {
        let count = source
            .sample_points
            .map_or(SampleCount::Resolution(source.resolution), SampleCount::Fixed);
        Self {
            count,
            method: source.aggregation,
        }
    }
}

/// Evenly spaced points at positions `i / (n - 1)` of the line length
pub fn sample_points(line: &LineString<f64>, count: usize) -> Vec<Coord<f64>> {
    let Some(&first) = line.0.first() else {
        return Vec::new();
    };
    let total = Euclidean.length(line);
    if count <= 1 || total == 0.0 {
        return vec![first; count.max(1)];
    }

    #[allow(clippy::cast_precision_loss)]
    let step = total / (count - 1) as f64;
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let distance = if i == count - 1 { total } else { step * i as f64 };
            Euclidean
                .point_at_distance_from_start(line, distance)
                .map_or(first, |point| point.0)
        })
        .collect()
}

/// Samples each part independently and concatenates the points
pub fn sample_multi_line(lines: &MultiLineString<f64>, count: SampleCount) -> Vec<Coord<f64>> {
    lines
        .iter()
        .flat_map(|line| sample_points(line, count.for_length(Euclidean.length(line))))
        .collect()
}

/// Reads the field at every sample point and aggregates the valued ones.
/// Returns `None` if no point has data.
pub fn sample_geometry_value(
    lines: &MultiLineString<f64>,
    field: &dyn MeasurementField,
    options: SamplingOptions,
) -> Option<f64> {
    let values = sample_multi_line(lines, options.count)
        .into_iter()
        .filter_map(|point| field.value_at(point))
        .collect_vec();
    options
        .method
        .apply(&values)
        .map(|value| round_to(value, VALUE_PRECISION))
}

/// Value of every segment of the network that overlaps data
pub fn sample_network(
    network: &SegmentedNetwork,
    field: &dyn MeasurementField,
    options: SamplingOptions,
) -> HashMap<SegmentId, f64> {
    let values: HashMap<SegmentId, f64> = network
        .segments
        .par_iter()
        .filter_map(|segment| {
            let lines = MultiLineString::new(vec![segment.geometry.clone()]);
            sample_geometry_value(&lines, field, options).map(|value| (segment.segment_id, value))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    debug!(
        "Sampled values for {} of {} segments",
        values.len(),
        network.len()
    );
    values
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use geo::{coord, line_string};

    use super::*;
    use crate::model::Segment;

    /// Value equals the x coordinate, no data beyond x = 100
    struct XField;

    impl MeasurementField for XField {
        fn value_at(&self, coord: Coord<f64>) -> Option<f64> {
            (coord.x <= 100.0).then_some(coord.x)
        }
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(SampleCount::Resolution(10.0).for_length(25.0), 4);
        assert_eq!(SampleCount::Resolution(10.0).for_length(20.0), 3);
        assert_eq!(SampleCount::Resolution(10.0).for_length(0.0), 1);
        assert_eq!(SampleCount::Fixed(5).for_length(1000.0), 5);
    }

    #[test]
    fn test_points_are_evenly_spaced() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)];
        let points = sample_points(&line, 5);
        assert_eq!(
            points,
            vec![
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 5.0, y: 0.0 },
                coord! { x: 10.0, y: 0.0 },
                coord! { x: 10.0, y: 5.0 },
                coord! { x: 10.0, y: 10.0 },
            ]
        );
    }

    #[test]
    fn test_single_point_and_empty_line() {
        let line = line_string![(x: 3.0, y: 4.0), (x: 6.0, y: 8.0)];
        assert_eq!(sample_points(&line, 1), vec![coord! { x: 3.0, y: 4.0 }]);
        assert!(sample_points(&LineString::new(vec![]), 3).is_empty());

        // Degenerate line with repeated nodes
        let point = line_string![(x: 2.0, y: 2.0), (x: 2.0, y: 2.0)];
        assert_eq!(
            sample_points(&point, 3),
            vec![coord! { x: 2.0, y: 2.0 }; 3]
        );
    }

    #[test]
    fn test_multi_part_lines_are_sampled_per_part() {
        let lines = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            line_string![(x: 50.0, y: 0.0), (x: 70.0, y: 0.0)],
        ]);
        let points = sample_multi_line(&lines, SampleCount::Resolution(10.0));
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 50.0, 60.0, 70.0]);
    }

    #[test]
    fn test_aggregation_methods() {
        let values = [1.0, 4.0, 7.0];
        assert_eq!(AggregationMethod::Mean.apply(&values), Some(4.0));
        assert_eq!(AggregationMethod::Min.apply(&values), Some(1.0));
        assert_eq!(AggregationMethod::Max.apply(&values), Some(7.0));
        assert_eq!(AggregationMethod::Mean.apply(&[]), None);
    }

    #[test]
    fn test_mean_lies_within_valid_samples() {
        let lines = MultiLineString::new(vec![line_string![(x: 0.0, y: 0.0), (x: 140.0, y: 0.0)]]);
        let options = SamplingOptions {
            count: SampleCount::Resolution(20.0),
            method: AggregationMethod::Mean,
        };
        // Samples at 0, 20, .., 140; only those up to 100 carry data
        let value = sample_geometry_value(&lines, &XField, options).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_no_data_segment_is_omitted() {
        let network = SegmentedNetwork {
            segments: vec![
                Segment {
                    segment_id: 1,
                    parent_way_id: 1,
                    nodes: vec![1, 2],
                    geometry: line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
                    tags: Default::default(),
                },
                Segment {
                    segment_id: 2,
                    parent_way_id: 2,
                    nodes: vec![3, 4],
                    geometry: line_string![(x: 200.0, y: 0.0), (x: 300.0, y: 0.0)],
                    tags: Default::default(),
                },
            ],
        };
        let options = SamplingOptions {
            count: SampleCount::Fixed(3),
            method: AggregationMethod::Max,
        };
        let values = sample_network(&network, &XField, options);
        assert_eq!(values.len(), 1);
        assert_eq!(values.get(&1), Some(&10.0));
        assert!(!values.contains_key(&2));
    }

    #[test]
    fn test_values_are_rounded() {
        assert_eq!(round_to(1.234_56, 3), 1.235);
        assert_eq!(round_to(-0.000_4, 3), -0.0);
    }
}
