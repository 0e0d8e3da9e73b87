//! Reference values for binning tests.

/// Sinusoidal equal-area grid layouts.
pub mod sea_grid {
    /// Number of rows of the default global grid.
    pub const DEFAULT_NUM_ROWS: usize = 2160;

    /// Number of bins of the default global grid.
    pub const DEFAULT_NUM_BINS: i64 = 5_940_422;

    /// Columns per row of the 6-row grid.
    pub const SIX_ROW_COLS: [usize; 6] = [3, 8, 12, 12, 8, 3];

    /// Number of bins of the 6-row grid.
    pub const SIX_ROW_NUM_BINS: i64 = 46;
}

/// Three AVG aggregators over a water vapour product.
///
/// `AVG(tcwv, counts)`, `AVG(tcwv_uncertainty -> tcwv_unc)` and
/// `AVG(tcwv_uncertainty -> tcwv_unc_sum, sums)`, all with weight
/// coefficient 1, fed with one pass of five observations of which two are
/// NaN.
pub mod three_avg {
    pub const VARIABLES: [&str; 2] = ["tcwv", "tcwv_uncertainty"];

    pub const BIN_INDEX: i64 = 20;

    pub const OBSERVATIONS: [[f32; 2]; 5] = [
        [35.4, 1.76],
        [35.4, 1.76],
        [f32::NAN, f32::NAN],
        [f32::NAN, f32::NAN],
        [35.4, 1.76],
    ];

    pub const OUTPUT_NAMES: [&str; 8] = [
        "tcwv_mean",
        "tcwv_sigma",
        "tcwv_counts",
        "tcwv_unc_mean",
        "tcwv_unc_sigma",
        "tcwv_unc_sum_sum",
        "tcwv_unc_sum_sum_sq",
        "tcwv_unc_sum_weights",
    ];

    pub const OUTPUT: [f64; 8] = [
        35.400001525878906,
        0.012500000186264515,
        3.0,
        1.7599998712539673,
        7.213353528641164E-4,
        8.799999237060547,
        15.48799991607666,
        5.0,
    ];

    /// Absolute tolerance of the reference values.
    pub const TOLERANCE: f64 = 1e-8;
}

/// Outlier-aware mean over five passes.
pub mod avg_outlier {
    /// One value per pass.
    pub const PASS_VALUES: [f32; 5] = [0.68, 0.72, 1.87, 0.64, 0.70];

    pub const DEVIATION_FACTOR: f64 = 1.9;

    /// Mean, sigma and count after rejecting 1.87.
    pub const OUTPUT: [f32; 3] = [0.685, 0.029580, 4.0];

    pub const TOLERANCE: f64 = 1e-5;
}
