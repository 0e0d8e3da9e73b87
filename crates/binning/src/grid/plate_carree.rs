use super::{lat_to_row, lon_to_col, normalize_lon, PlanetaryGrid};
use crate::error::{BinningError, Result};

/// Regular lat/lon grid with `2 * num_rows` columns per row.
///
/// Cells are square in degrees (`180 / num_rows`), so high-latitude cells
/// cover far less area than equatorial ones.
#[derive(Debug, Clone)]
pub struct PlateCarreeGrid {
    num_rows: usize,
    num_cols: usize,
}

impl PlateCarreeGrid {
    pub fn new(num_rows: usize) -> Result<Self> {
        if num_rows < 2 || num_rows % 2 != 0 {
            return Err(BinningError::invalid_parameter(
                "num_rows",
                format!("must be even and >= 2, got {}", num_rows),
            ));
        }
        Ok(Self {
            num_rows,
            num_cols: 2 * num_rows,
        })
    }
}

impl PlanetaryGrid for PlateCarreeGrid {
    fn bin_index(&self, lat: f64, lon: f64) -> i64 {
        let row = lat_to_row(lat, self.num_rows);
        let col = lon_to_col(normalize_lon(lon), self.num_cols);
        (row * self.num_cols + col) as i64
    }

    fn row_index(&self, bin_index: i64) -> usize {
        ((bin_index.max(0) as usize) / self.num_cols).min(self.num_rows - 1)
    }

    fn num_bins(&self) -> i64 {
        (self.num_rows * self.num_cols) as i64
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self, _row: usize) -> usize {
        self.num_cols
    }

    fn first_bin_index(&self, row: usize) -> i64 {
        (row * self.num_cols) as i64
    }

    fn center_lat(&self, row: usize) -> f64 {
        90.0 - (row as f64 + 0.5) * 180.0 / self.num_rows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let grid = PlateCarreeGrid::new(180).unwrap();
        assert_eq!(grid.num_bins(), 64_800);
        assert_eq!(grid.num_cols(0), 360);
        assert_eq!(grid.num_cols(90), 360);
        assert_eq!(grid.first_bin_index(2), 720);
        assert!(PlateCarreeGrid::new(5).is_err());
    }

    #[test]
    fn test_round_trip() {
        let grid = PlateCarreeGrid::new(180).unwrap();
        let idx = grid.bin_index(45.2, -73.9);
        assert_eq!(grid.row_index(idx), 44);
        let (lat, lon) = grid.center_lat_lon(idx);
        assert!((lat - 45.5).abs() < 1e-9);
        assert!((lon - -73.5).abs() < 1e-9);
        assert_eq!(grid.bin_index(lat, lon), idx);
    }
}
