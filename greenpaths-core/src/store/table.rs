//! Flat tabular form of the value store used at the persistence boundary

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use geo::LineString;
use itertools::Itertools;
use log::info;
use wkt::{ToWkt, TryFromWkt};

use crate::Error;
use crate::model::SegmentId;

pub const SEGMENT_ID_COLUMN: &str = "segment_id";
pub const GEOMETRY_COLUMN: &str = "geometry_as_text";
pub const LENGTH_COLUMN: &str = "length";

/// One row of the segment value table. `values` holds every raw and
/// normalized source column present for the segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub segment_id: SegmentId,
    pub geometry: Option<LineString<f64>>,
    pub length: f64,
    pub values: BTreeMap<String, f64>,
}

impl SegmentRow {
    pub fn empty(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            geometry: None,
            length: 0.0,
            values: BTreeMap::new(),
        }
    }
}

/// Writes rows as CSV with the columns `segment_id`, every value column in
/// name order, `geometry_as_text` (WKT) and `length`
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_csv(rows: &[SegmentRow], path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let value_columns: Vec<&str> = rows
        .iter()
        .flat_map(|row| row.values.keys().map(String::as_str))
        .sorted_unstable()
        .dedup()
        .collect();

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(
        std::iter::once(SEGMENT_ID_COLUMN)
            .chain(value_columns.iter().copied())
            .chain([GEOMETRY_COLUMN, LENGTH_COLUMN]),
    )?;

    for row in rows {
        let mut record = Vec::with_capacity(value_columns.len() + 3);
        record.push(row.segment_id.to_string());
        record.extend(value_columns.iter().map(|column| {
            row.values
                .get(*column)
                .map(ToString::to_string)
                .unwrap_or_default()
        }));
        record.push(
            row.geometry
                .as_ref()
                .map(|geometry| geometry.to_wkt().to_string())
                .unwrap_or_default(),
        );
        record.push(row.length.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!("Wrote {} segment rows to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a table written by [`write_csv`]. Geometry text is parsed with a WKT
/// parser, empty cells are treated as missing values.
///
/// # Errors
///
/// Returns an error for unreadable files, missing key columns or unparsable
/// cells.
pub fn read_csv(path: &Path) -> Result<Vec<SegmentRow>, Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| Error::InvalidData(format!("Segment table lacks column '{name}'")))
    };
    let id_index = position(SEGMENT_ID_COLUMN)?;
    let geometry_index = position(GEOMETRY_COLUMN)?;
    let length_index = position(LENGTH_COLUMN)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = SegmentRow::empty(parse_cell(SEGMENT_ID_COLUMN, &record[id_index])?);
        row.length = parse_cell(LENGTH_COLUMN, &record[length_index])?;

        let geometry = record[geometry_index].trim();
        if !geometry.is_empty() {
            row.geometry = Some(
                LineString::<f64>::try_from_wkt_str(geometry)
                    .map_err(|e| Error::WktError(format!("Segment {}: {e}", row.segment_id)))?,
            );
        }

        for (index, column) in headers.iter().enumerate() {
            if index == id_index || index == geometry_index || index == length_index {
                continue;
            }
            let cell = record[index].trim();
            if !cell.is_empty() {
                row.values.insert(column.to_string(), parse_cell(column, cell)?);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_cell<T: std::str::FromStr>(column: &str, cell: &str) -> Result<T, Error> {
    cell.trim()
        .parse()
        .map_err(|_| Error::InvalidData(format!("Invalid value '{cell}' in column '{column}'")))
}
