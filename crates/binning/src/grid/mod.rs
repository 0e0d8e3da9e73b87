//! Planetary grids mapping geographic positions to bin indices.
//!
//! Rows are numbered from north (row 0) to south. Within a row, columns run
//! eastwards from -180°. Bin indices are assigned row by row, so the first
//! bin index of a row is the sum of the column counts of all rows above it.

mod plate_carree;
mod sea;

pub use plate_carree::PlateCarreeGrid;
pub use sea::SeaGrid;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default number of rows of the global grid (about 9.28 km cells).
pub const DEFAULT_NUM_ROWS: usize = 2160;

/// Deterministic bijection between grid cells and bin indices.
pub trait PlanetaryGrid: Send + Sync + std::fmt::Debug {
    /// Bin index of the cell containing (`lat`, `lon`).
    ///
    /// Latitudes are clamped to [-90, 90]; longitudes wrap into [-180, 180).
    fn bin_index(&self, lat: f64, lon: f64) -> i64;

    /// Row containing `bin_index`.
    fn row_index(&self, bin_index: i64) -> usize;

    /// Total number of bins.
    fn num_bins(&self) -> i64;

    /// Number of rows.
    fn num_rows(&self) -> usize;

    /// Number of columns in `row`.
    fn num_cols(&self, row: usize) -> usize;

    /// Bin index of the first (westernmost) cell of `row`.
    fn first_bin_index(&self, row: usize) -> i64;

    /// Latitude of the center of `row`.
    fn center_lat(&self, row: usize) -> f64;

    /// Center (lat, lon) of the cell with `bin_index`.
    fn center_lat_lon(&self, bin_index: i64) -> (f64, f64) {
        let row = self.row_index(bin_index);
        let col = (bin_index - self.first_bin_index(row)) as f64;
        let lon = -180.0 + (col + 0.5) * 360.0 / self.num_cols(row) as f64;
        (self.center_lat(row), lon)
    }
}

/// Available grid layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Equal-area grid, columns per row proportional to cos(latitude).
    #[default]
    Sea,
    /// Regular lat/lon grid with `2 * num_rows` columns in every row.
    PlateCarree,
}

impl GridKind {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sea" | "seagrid" => Some(Self::Sea),
            "plate_carree" | "platecarree" | "plate-carree" => Some(Self::PlateCarree),
            _ => None,
        }
    }

    /// Construct a grid of this kind.
    pub fn create(&self, num_rows: usize) -> Result<Box<dyn PlanetaryGrid>> {
        Ok(match self {
            Self::Sea => Box::new(SeaGrid::new(num_rows)?),
            Self::PlateCarree => Box::new(PlateCarreeGrid::new(num_rows)?),
        })
    }
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sea => write!(f, "sea"),
            Self::PlateCarree => write!(f, "plate_carree"),
        }
    }
}

/// Normalize a longitude into [-180, 180).
#[inline]
pub(crate) fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Row of a latitude on a grid whose rows are `180 / num_rows` degrees high.
#[inline]
pub(crate) fn lat_to_row(lat: f64, num_rows: usize) -> usize {
    if lat >= 90.0 {
        return 0;
    }
    if lat <= -90.0 {
        return num_rows - 1;
    }
    let row = ((90.0 - lat) * num_rows as f64 / 180.0) as usize;
    row.min(num_rows - 1)
}

/// Column of a (normalized) longitude in a row with `num_cols` columns.
#[inline]
pub(crate) fn lon_to_col(lon: f64, num_cols: usize) -> usize {
    let col = ((lon + 180.0) * num_cols as f64 / 360.0) as usize;
    col.min(num_cols - 1)
}
