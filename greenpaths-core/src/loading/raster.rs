//! ESRI ASCII grid reader

use std::fs;
use std::path::Path;

use log::debug;

use crate::Error;
use crate::sampling::{GridTransform, RasterGrid};

#[derive(Debug, Default)]
struct AsciiHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x: Option<(f64, bool)>,
    y: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

/// Reads an `.asc` raster file
///
/// # Errors
///
/// Returns [`Error::InvalidData`] for malformed headers or value blocks.
pub fn read_ascii_grid(path: &Path) -> Result<RasterGrid, Error> {
    let content = fs::read_to_string(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to open raster '{}': {e}", path.display()),
        )
    })?;
    let grid = parse_ascii_grid(&content)?;
    debug!(
        "Read raster {} with {}x{} cells",
        path.display(),
        grid.width(),
        grid.height()
    );
    Ok(grid)
}

pub fn parse_ascii_grid(content: &str) -> Result<RasterGrid, Error> {
    let mut header = AsciiHeader::default();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.peek() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
            break;
        }
        let value = parts
            .next()
            .ok_or_else(|| Error::InvalidData(format!("Header '{key}' has no value")))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(parse_number(key, value)?),
            "nrows" => header.nrows = Some(parse_number(key, value)?),
            "xllcorner" => header.x = Some((parse_number(key, value)?, false)),
            "xllcenter" => header.x = Some((parse_number(key, value)?, true)),
            "yllcorner" => header.y = Some((parse_number(key, value)?, false)),
            "yllcenter" => header.y = Some((parse_number(key, value)?, true)),
            "cellsize" => header.cellsize = Some(parse_number(key, value)?),
            "nodata_value" => header.nodata = Some(parse_number(key, value)?),
            other => {
                return Err(Error::InvalidData(format!(
                    "Unknown ASCII grid header '{other}'"
                )));
            }
        }
        lines.next();
    }

    let missing = |name: &str| Error::InvalidData(format!("ASCII grid lacks '{name}'"));
    let ncols = header.ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = header.nrows.ok_or_else(|| missing("nrows"))?;
    let cell_size = header.cellsize.ok_or_else(|| missing("cellsize"))?;
    let (x, x_is_center) = header.x.ok_or_else(|| missing("xllcorner"))?;
    let (y, y_is_center) = header.y.ok_or_else(|| missing("yllcorner"))?;

    let left = if x_is_center { x - cell_size / 2.0 } else { x };
    let bottom = if y_is_center { y - cell_size / 2.0 } else { y };
    #[allow(clippy::cast_precision_loss)]
    let top = bottom + nrows as f64 * cell_size;

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|token| {
            let value: f64 = parse_number("cell", token)?;
            Ok(match header.nodata {
                Some(nodata) if (value - nodata).abs() < f64::EPSILON => f64::NAN,
                _ => value,
            })
        })
        .collect::<Result<Vec<f64>, Error>>()?;

    RasterGrid::new(
        GridTransform {
            left,
            top,
            cell_size,
        },
        ncols,
        nrows,
        values,
    )
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::InvalidData(format!("Invalid value '{value}' for '{key}'")))
}
