//! In-memory result table and its materialization to CSV or `GeoJSON`

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use log::info;
use serde_json::{Map, Value, json};

use super::ExposureSink;
use crate::Error;
use crate::config::{OutputConfig, OutputFormat};
use crate::model::PathExposureStatistics;

/// Route-level columns preceding the per-source statistics
pub const BASE_COLUMNS: [&str; 6] = [
    "from_id",
    "to_id",
    "user_id",
    "config_name",
    "length",
    "travel_time",
];

/// Backing table of aggregated routes. Columns are added as new sources show
/// up between batches.
#[derive(Debug, Clone, Default)]
pub struct ExposureTable {
    columns: Vec<String>,
    rows: Vec<PathExposureStatistics>,
}

impl ExposureSink for ExposureTable {
    fn add_columns(&mut self, columns: &[String]) -> Result<(), Error> {
        for column in columns {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
            }
        }
        Ok(())
    }

    fn write_batch(&mut self, rows: Vec<PathExposureStatistics>) -> Result<(), Error> {
        self.rows.extend(rows);
        Ok(())
    }
}

impl ExposureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PathExposureStatistics] {
        &self.rows
    }

    /// Writes the table to a timestamped file in the configured directory and
    /// returns its path
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, output: &OutputConfig) -> Result<PathBuf, Error> {
        fs::create_dir_all(&output.dir)?;
        let path = output_path(output, Local::now().naive_local());
        match output.format {
            OutputFormat::Csv => self.write_csv(&path)?,
            OutputFormat::GeoJson => self.write_geojson(&path)?,
        }
        info!("Wrote {} route rows to {}", self.rows.len(), path.display());
        Ok(path)
    }

    /// One line per route, geometry is not written
    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(
            BASE_COLUMNS
                .iter()
                .copied()
                .chain(self.columns.iter().map(String::as_str)),
        )?;

        for row in &self.rows {
            let properties = properties(row);
            let record: Vec<String> = BASE_COLUMNS
                .iter()
                .copied()
                .chain(self.columns.iter().map(String::as_str))
                .map(|column| match properties.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                })
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// `FeatureCollection` with the route geometry, if kept, and all columns
    /// as properties
    pub fn write_geojson(&self, path: &Path) -> Result<(), Error> {
        let features = self
            .rows
            .iter()
            .map(|row| Feature {
                bbox: None,
                geometry: row
                    .geometry
                    .as_ref()
                    .map(|geometry| Geometry::new(GeoJsonValue::from(geometry))),
                id: None,
                properties: Some(properties(row)),
                foreign_members: None,
            })
            .collect();

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        fs::write(path, collection.to_string())?;
        Ok(())
    }
}

/// `{dir}/{base_name}_{YYYYmmdd_HHMMSS}.{csv|geojson}`
pub fn output_path(output: &OutputConfig, timestamp: NaiveDateTime) -> PathBuf {
    let extension = match output.format {
        OutputFormat::Csv => "csv",
        OutputFormat::GeoJson => "geojson",
    };
    output.dir.join(format!(
        "{}_{}.{extension}",
        output.base_name,
        timestamp.format("%Y%m%d_%H%M%S")
    ))
}

fn properties(row: &PathExposureStatistics) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("from_id".into(), json!(row.from_id));
    properties.insert("to_id".into(), json!(row.to_id));
    properties.insert("user_id".into(), json!(row.user_id));
    properties.insert("config_name".into(), json!(row.config_name));
    properties.insert("length".into(), json!(row.length));
    properties.insert("travel_time".into(), json!(row.travel_time));

    for (source, stats) in &row.sources {
        properties.insert(format!("{source}_min"), json!(stats.min));
        properties.insert(format!("{source}_max"), json!(stats.max));
        properties.insert(format!("{source}_avg"), json!(stats.time_weighted_average));
        properties.insert(format!("{source}_sum"), json!(stats.time_weighted_sum));
        if let Some(ranges) = &stats.cumulative_time_by_range {
            properties.insert(format!("{source}_cumulative"), json!(ranges));
        }
    }
    properties
}
