//! Equal-area "SEA" grid.

use super::{lat_to_row, lon_to_col, normalize_lon, PlanetaryGrid};
use crate::error::{BinningError, Result};

/// Global equal-area grid.
///
/// Rows are `180 / num_rows` degrees high. Row `r` has
/// `round(2 * num_rows * cos(center_lat(r)))` columns, so the cell area is
/// roughly constant over the globe.
#[derive(Debug, Clone)]
pub struct SeaGrid {
    num_rows: usize,
    lat_bin: Vec<f64>,
    base_bin: Vec<i64>,
    num_bin: Vec<usize>,
    num_bins: i64,
}

impl SeaGrid {
    /// Create a grid with `num_rows` rows; `num_rows` must be even and >= 2.
    pub fn new(num_rows: usize) -> Result<Self> {
        if num_rows < 2 {
            return Err(BinningError::invalid_parameter(
                "num_rows",
                format!("must be >= 2, got {}", num_rows),
            ));
        }
        if num_rows % 2 != 0 {
            return Err(BinningError::invalid_parameter(
                "num_rows",
                format!("must be even, got {}", num_rows),
            ));
        }

        let mut lat_bin = Vec::with_capacity(num_rows);
        let mut base_bin = Vec::with_capacity(num_rows);
        let mut num_bin = Vec::with_capacity(num_rows);
        let mut next_base = 0i64;

        for row in 0..num_rows {
            let lat = 90.0 - (row as f64 + 0.5) * 180.0 / num_rows as f64;
            let cols = (2.0 * num_rows as f64 * lat.to_radians().cos() + 0.5) as usize;
            let cols = cols.max(1);
            lat_bin.push(lat);
            base_bin.push(next_base);
            num_bin.push(cols);
            next_base += cols as i64;
        }

        Ok(Self {
            num_rows,
            lat_bin,
            base_bin,
            num_bin,
            num_bins: next_base,
        })
    }
}

impl PlanetaryGrid for SeaGrid {
    fn bin_index(&self, lat: f64, lon: f64) -> i64 {
        let row = lat_to_row(lat, self.num_rows);
        let col = lon_to_col(normalize_lon(lon), self.num_bin[row]);
        self.base_bin[row] + col as i64
    }

    fn row_index(&self, bin_index: i64) -> usize {
        // last row whose first bin is <= bin_index
        self.base_bin
            .partition_point(|&base| base <= bin_index)
            .saturating_sub(1)
    }

    fn num_bins(&self) -> i64 {
        self.num_bins
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self, row: usize) -> usize {
        self.num_bin[row]
    }

    fn first_bin_index(&self, row: usize) -> i64 {
        self.base_bin[row]
    }

    fn center_lat(&self, row: usize) -> f64 {
        self.lat_bin[row]
    }
}
