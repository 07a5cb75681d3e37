//! Measurement fields that can be read at a coordinate

use geo::{Coord, Rect};

use crate::Error;

/// A spatial field that yields one value per location, or nothing where it
/// has no data
pub trait MeasurementField: Sync {
    fn value_at(&self, coord: Coord<f64>) -> Option<f64>;
}

/// Position of the top-left corner and the square cell size of a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub left: f64,
    pub top: f64,
    pub cell_size: f64,
}

/// Row-major grid of cell values, first row at the top. Missing data is
/// stored as `NaN`.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    transform: GridTransform,
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl RasterGrid {
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the value count does not match the
    /// grid size or the cell size is not positive.
    pub fn new(
        transform: GridTransform,
        width: usize,
        height: usize,
        values: Vec<f64>,
    ) -> Result<Self, Error> {
        if transform.cell_size <= 0.0 || !transform.cell_size.is_finite() {
            return Err(Error::InvalidData(format!(
                "Raster cell size must be positive, got {}",
                transform.cell_size
            )));
        }
        let cell_count = cell_count(width, height)?;
        if values.len() != cell_count {
            return Err(Error::InvalidData(format!(
                "Raster of {width}x{height} cells got {} values",
                values.len()
            )));
        }
        Ok(Self {
            transform,
            width,
            height,
            values,
        })
    }

    /// Grid of the given extent filled with "no data"
    pub fn empty(extent: Rect<f64>, cell_size: f64) -> Result<Self, Error> {
        if cell_size <= 0.0 || !cell_size.is_finite() {
            return Err(Error::InvalidData(format!(
                "Raster cell size must be positive, got {cell_size}"
            )));
        }
        let width = cells_for(extent.width(), cell_size);
        let height = cells_for(extent.height(), cell_size);
        let values = vec![f64::NAN; cell_count(width, height)?];
        Self::new(
            GridTransform {
                left: extent.min().x,
                top: extent.max().y,
                cell_size,
            },
            width,
            height,
            values,
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> GridTransform {
        self.transform
    }

    /// Row and column of the cell containing `coord`
    pub fn cell_index(&self, coord: Coord<f64>) -> Option<(usize, usize)> {
        let GridTransform {
            left,
            top,
            cell_size,
        } = self.transform;
        let col = ((coord.x - left) / cell_size).floor();
        let row = ((top - coord.y) / cell_size).floor();
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (row, col) = (row as usize, col as usize);
        (row < self.height && col < self.width).then_some((row, col))
    }

    /// Centre of a cell
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        let GridTransform {
            left,
            top,
            cell_size,
        } = self.transform;
        Coord {
            x: left + (col as f64 + 0.5) * cell_size,
            y: top - (row as f64 + 0.5) * cell_size,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let value = self.values[row * self.width + col];
        (!value.is_nan()).then_some(value)
    }

    /// Number of cells holding a value
    pub fn data_cell_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}

impl MeasurementField for RasterGrid {
    fn value_at(&self, coord: Coord<f64>) -> Option<f64> {
        self.cell_index(coord)
            .and_then(|(row, col)| self.get(row, col))
    }
}

fn cell_count(width: usize, height: usize) -> Result<usize, Error> {
    width
        .checked_mul(height)
        .ok_or_else(|| Error::InvalidData(format!("Raster of {width}x{height} cells is too large")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cells_for(extent: f64, cell_size: f64) -> usize {
    ((extent / cell_size).ceil() as usize).max(1)
}
