//! Pipeline configuration schema
//!
//! The configuration is read from TOML with unknown keys rejected. Optional
//! sections fall back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use serde::Deserialize;

use crate::Error;
use crate::exposure::ValueRange;
use crate::sampling::{AggregationMethod, TransformRegistry};
use crate::store::{GEOMETRY_COLUMN, LENGTH_COLUMN, SEGMENT_ID_COLUMN};

pub const DEFAULT_SEGMENT_ID_BASE: i64 = 1_000_000_000_000;

/// Whether `crs` names a longitude/latitude system with degree units
pub fn is_geographic_crs(crs: &str) -> bool {
    matches!(
        crs.trim().to_ascii_uppercase().as_str(),
        "EPSG:4326" | "WGS84" | "OGC:CRS84" | "EPSG:4258"
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GreenPathsConfig {
    /// Coordinate reference system every input must share, e.g. `EPSG:3879`
    pub project_crs: String,
    pub network: NetworkConfig,
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub osm_path: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_segment_id_base")]
    pub segment_id_base: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Raster,
    Vector,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceConfig {
    pub name: String,
    pub kind: DataSourceKind,
    pub path: PathBuf,
    pub crs: Option<String>,
    pub min: f64,
    pub max: f64,
    /// More is better (greenery). Normalized values of good sources are negative.
    #[serde(default)]
    pub good_exposure: bool,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Forces a fixed number of sample points per segment part
    pub sample_points: Option<usize>,
    #[serde(default)]
    pub aggregation: AggregationMethod,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    pub transform: Option<String>,
}

impl DataSourceConfig {
    /// Key of the normalized column derived from this source
    pub fn normalized_key(&self) -> String {
        normalized_key(&self.name)
    }
}

pub fn normalized_key(source: &str) -> String {
    format!("{source}_normalized")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_safety_percentage")]
    pub data_coverage_safety_percentage: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            data_coverage_safety_percentage: default_safety_percentage(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    #[serde(default = "default_single_batch_threshold")]
    pub single_batch_threshold: usize,
    #[serde(default = "default_batch_fraction")]
    pub batch_fraction: f64,
    /// Used for segments missing from the router's travel time table (m/s)
    #[serde(default = "default_speed_mps")]
    pub default_speed_mps: f64,
    #[serde(default)]
    pub keep_geometry: bool,
    #[serde(default)]
    pub cumulative_ranges: BTreeMap<String, Vec<[f64; 2]>>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            single_batch_threshold: default_single_batch_threshold(),
            batch_fraction: default_batch_fraction(),
            default_speed_mps: default_speed_mps(),
            keep_geometry: false,
            cumulative_ranges: BTreeMap::new(),
        }
    }
}

impl AggregationConfig {
    pub fn ranges_for(&self, source: &str) -> Option<Vec<ValueRange>> {
        self.cumulative_ranges.get(source).map(|ranges| {
            ranges
                .iter()
                .map(|&[low, high]| ValueRange::new(low, high))
                .collect()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    GeoJson,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            base_name: default_base_name(),
            format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_segment_id_base() -> i64 {
    DEFAULT_SEGMENT_ID_BASE
}

fn default_resolution() -> f64 {
    10.0
}

fn default_value_column() -> String {
    "value".to_string()
}

fn default_safety_percentage() -> f64 {
    40.0
}

fn default_single_batch_threshold() -> usize {
    1000
}

fn default_batch_fraction() -> f64 {
    0.1
}

fn default_speed_mps() -> f64 {
    1.33
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_base_name() -> String {
    "exposure".to_string()
}

impl GreenPathsConfig {
    /// Parses a TOML document without validating it
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Reads and validates a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unreadable, malformed or inconsistent
    /// files and [`Error::UnknownTransform`] for unregistered transform names.
    pub fn from_path(path: &Path, registry: &TransformRegistry) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read configuration '{}': {e}",
                path.display()
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate(registry)?;
        Ok(config)
    }

    pub fn data_source(&self, name: &str) -> Option<&DataSourceConfig> {
        self.data_sources.iter().find(|source| source.name == name)
    }

    pub fn validate(&self, registry: &TransformRegistry) -> Result<(), Error> {
        if self.project_crs.trim().is_empty() {
            return Err(Error::Configuration(
                "project_crs must name a coordinate reference system".to_string(),
            ));
        }
        if is_geographic_crs(&self.project_crs) {
            return Err(Error::Configuration(format!(
                "project_crs {} is geographic, lengths and resolutions need a metric crs",
                self.project_crs
            )));
        }

        let mut names = HashSet::new();
        for source in &self.data_sources {
            validate_data_source(source, &self.project_crs, registry)?;
            if !names.insert(source.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "Duplicate data source name '{}'",
                    source.name
                )));
            }
        }
        for source in &self.data_sources {
            let reserved = [SEGMENT_ID_COLUMN, GEOMETRY_COLUMN, LENGTH_COLUMN]
                .contains(&source.name.as_str());
            let shadows_normalized = self
                .data_sources
                .iter()
                .any(|other| other.normalized_key() == source.name);
            if reserved || shadows_normalized {
                return Err(Error::Configuration(format!(
                    "Data source name '{}' clashes with a segment table column",
                    source.name
                )));
            }
        }

        let safety = self.validation.data_coverage_safety_percentage;
        if !(0.0..=100.0).contains(&safety) {
            return Err(Error::Configuration(format!(
                "data_coverage_safety_percentage must be within 0..=100, got {safety}"
            )));
        }

        let aggregation = &self.aggregation;
        if !(aggregation.batch_fraction > 0.0 && aggregation.batch_fraction <= 1.0) {
            return Err(Error::Configuration(format!(
                "batch_fraction must be within (0, 1], got {}",
                aggregation.batch_fraction
            )));
        }
        if aggregation.default_speed_mps <= 0.0 {
            return Err(Error::Configuration(
                "default_speed_mps must be positive".to_string(),
            ));
        }
        for (source, ranges) in &aggregation.cumulative_ranges {
            if !names.contains(source.as_str()) {
                return Err(Error::Configuration(format!(
                    "Cumulative ranges given for unknown data source '{source}'"
                )));
            }
            if let Some([low, high]) = ranges.iter().find(|[low, high]| low >= high) {
                return Err(Error::Configuration(format!(
                    "Invalid range [{low}, {high}] for '{source}': low must be below high"
                )));
            }
        }

        if self.output.base_name.trim().is_empty() {
            return Err(Error::Configuration(
                "output base_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_data_source(
    source: &DataSourceConfig,
    project_crs: &str,
    registry: &TransformRegistry,
) -> Result<(), Error> {
    if source.name.trim().is_empty() {
        return Err(Error::Configuration(
            "Data source name must not be empty".to_string(),
        ));
    }

    match source.crs.as_deref() {
        None => {
            return Err(Error::Configuration(format!(
                "Data source '{}' does not declare a crs",
                source.name
            )));
        }
        Some(crs) if !crs.eq_ignore_ascii_case(project_crs) => {
            return Err(Error::Configuration(format!(
                "Data source '{}' uses crs {crs}, expected {project_crs}",
                source.name
            )));
        }
        Some(_) => {}
    }

    if !source.min.is_finite() || !source.max.is_finite() || source.min >= source.max {
        return Err(Error::Configuration(format!(
            "Data source '{}' needs finite min < max, got [{}, {}]",
            source.name, source.min, source.max
        )));
    }

    if source.resolution <= 0.0 {
        return Err(Error::Configuration(format!(
            "Data source '{}' needs a positive resolution",
            source.name
        )));
    }

    if source.sample_points == Some(0) {
        return Err(Error::Configuration(format!(
            "Data source '{}' forces zero sample points",
            source.name
        )));
    }

    if let Some(transform) = &source.transform {
        registry.get(transform)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        project_crs = "EPSG:3879"

        [network]
        osm_path = "data/helsinki.osm.pbf"

        [[data_sources]]
        name = "aqi"
        kind = "raster"
        path = "data/aqi.asc"
        crs = "EPSG:3879"
        min = 1.0
        max = 5.0

        [[data_sources]]
        name = "greenery"
        kind = "vector"
        path = "data/green.geojson"
        crs = "epsg:3879"
        min = 0.0
        max = 1.0
        good_exposure = true
        aggregation = "max"
        transform = "positive_only"

        [aggregation]
        cumulative_ranges = { aqi = [[1.0, 2.0], [2.0, 5.0]] }
    "#;

    #[test]
    fn test_parse_with_defaults() {
        let config = GreenPathsConfig::from_toml_str(CONFIG).unwrap();
        config.validate(&TransformRegistry::default()).unwrap();

        assert_eq!(config.network.segment_id_base, DEFAULT_SEGMENT_ID_BASE);
        assert_eq!(config.aggregation.single_batch_threshold, 1000);
        assert!((config.aggregation.batch_fraction - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.output.format, OutputFormat::Csv);

        let greenery = config.data_source("greenery").unwrap();
        assert!(greenery.good_exposure);
        assert_eq!(greenery.aggregation, AggregationMethod::Max);
        assert_eq!(greenery.normalized_key(), "greenery_normalized");

        let ranges = config.aggregation.ranges_for("aqi").unwrap();
        assert_eq!(ranges, vec![ValueRange::new(1.0, 2.0), ValueRange::new(2.0, 5.0)]);
        assert!(config.aggregation.ranges_for("greenery").is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let content = CONFIG.replace("[aggregation]", "[aggregation]\nbatch_size = 10");
        assert!(matches!(
            GreenPathsConfig::from_toml_str(&content),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_transform() {
        let content = CONFIG.replace("positive_only", "does_not_exist");
        let config = GreenPathsConfig::from_toml_str(&content).unwrap();
        assert!(matches!(
            config.validate(&TransformRegistry::default()),
            Err(Error::UnknownTransform(name)) if name == "does_not_exist"
        ));
    }

    #[test]
    fn test_crs_mismatch_and_missing() {
        let mismatch = CONFIG.replace(
            "\n        crs = \"EPSG:3879\"",
            "\n        crs = \"EPSG:4326\"",
        );
        let config = GreenPathsConfig::from_toml_str(&mismatch).unwrap();
        assert!(matches!(
            config.validate(&TransformRegistry::default()),
            Err(Error::Configuration(_))
        ));

        let missing = CONFIG.replace("\n        crs = \"EPSG:3879\"", "");
        let config = GreenPathsConfig::from_toml_str(&missing).unwrap();
        assert!(matches!(
            config.validate(&TransformRegistry::default()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_bounds() {
        let content = CONFIG.replace("max = 5.0", "max = 1.0");
        let config = GreenPathsConfig::from_toml_str(&content).unwrap();
        assert!(config.validate(&TransformRegistry::default()).is_err());
    }

    #[test]
    fn test_geographic_project_crs_is_rejected() {
        let content = CONFIG.replace("EPSG:3879", "EPSG:4326").replace("epsg:3879", "epsg:4326");
        let config = GreenPathsConfig::from_toml_str(&content).unwrap();
        match config.validate(&TransformRegistry::default()) {
            Err(Error::Configuration(message)) => assert!(message.contains("geographic")),
            other => panic!("Expected a configuration error, got {other:?}"),
        }
        assert!(is_geographic_crs(" wgs84 "));
        assert!(!is_geographic_crs("EPSG:3857"));
    }

    #[test]
    fn test_source_names_clashing_with_table_columns() {
        for name in ["segment_id", "geometry_as_text", "length", "aqi_normalized"] {
            let content = CONFIG.replace("name = \"greenery\"", &format!("name = \"{name}\""));
            let config = GreenPathsConfig::from_toml_str(&content).unwrap();
            assert!(
                matches!(
                    config.validate(&TransformRegistry::default()),
                    Err(Error::Configuration(_))
                ),
                "{name} was accepted"
            );
        }
    }
}
