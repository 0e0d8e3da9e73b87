//! Synthetic swath generators.
//!
//! The generators produce plain pixels rather than engine types so that any
//! crate in the workspace can use them without depending on the engine.

/// A single synthetic swath pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SwathPixel {
    pub lat: f64,
    pub lon: f64,
    /// Days since 2000-01-01T00:00:00Z.
    pub mjd: f64,
    pub values: Vec<f32>,
}

/// Layout of a synthetic swath: a regular block of scan lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwathSpec {
    /// Number of scan lines (along track).
    pub lines: usize,
    /// Pixels per scan line (across track).
    pub pixels: usize,
    /// Latitude of the first line.
    pub start_lat: f64,
    /// Longitude of the first pixel of every line.
    pub start_lon: f64,
    /// Pixel spacing in degrees, in both directions.
    pub step_deg: f64,
    /// Acquisition time of the first line.
    pub start_mjd: f64,
    /// Number of values per pixel.
    pub num_vars: usize,
}

impl Default for SwathSpec {
    fn default() -> Self {
        Self {
            lines: 10,
            pixels: 10,
            start_lat: 45.0,
            start_lon: 5.0,
            step_deg: 0.05,
            start_mjd: 1096.0,
            num_vars: 1,
        }
    }
}

/// Value of variable `var` at pixel (`line`, `pixel`) of pass `pass`.
///
/// `(var + 1) * (1 + line / 10 + pixel / 100) + pass`
pub fn swath_value(pass: usize, line: usize, pixel: usize, var: usize) -> f32 {
    (var + 1) as f32 * (1.0 + line as f32 * 0.1 + pixel as f32 * 0.01) + pass as f32
}

/// Creates one pass of a regular swath heading south.
///
/// Values follow [`swath_value`]; lines are one second apart.
pub fn create_swath_pass(spec: &SwathSpec, pass: usize) -> Vec<SwathPixel> {
    let mut pixels = Vec::with_capacity(spec.lines * spec.pixels);
    for line in 0..spec.lines {
        let lat = spec.start_lat - line as f64 * spec.step_deg;
        let mjd = spec.start_mjd + pass as f64 + line as f64 / 86_400.0;
        for pixel in 0..spec.pixels {
            let lon = spec.start_lon + pixel as f64 * spec.step_deg;
            let values = (0..spec.num_vars)
                .map(|var| swath_value(pass, line, pixel, var))
                .collect();
            pixels.push(SwathPixel {
                lat,
                lon,
                mjd,
                values,
            });
        }
    }
    pixels
}

/// Creates `num_passes` passes of the same swath, one day apart.
pub fn create_swath_passes(spec: &SwathSpec, num_passes: usize) -> Vec<Vec<SwathPixel>> {
    (0..num_passes).map(|p| create_swath_pass(spec, p)).collect()
}

/// Sets every value of every `n`-th pixel to NaN.
pub fn with_nan_gaps(mut pixels: Vec<SwathPixel>, n: usize) -> Vec<SwathPixel> {
    if n == 0 {
        return pixels;
    }
    for pixel in pixels.iter_mut().step_by(n) {
        pixel.values.iter_mut().for_each(|v| *v = f32::NAN);
    }
    pixels
}

/// Sets the position of every `n`-th pixel to NaN, as for unlocated pixels.
pub fn with_invalid_positions(mut pixels: Vec<SwathPixel>, n: usize) -> Vec<SwathPixel> {
    if n == 0 {
        return pixels;
    }
    for pixel in pixels.iter_mut().step_by(n) {
        pixel.lat = f64::NAN;
    }
    pixels
}

/// Deterministic pseudo-random values in `[low, high)`.
///
/// A linear congruential generator, so sequences are stable across
/// platforms and runs.
pub fn create_noise(seed: u64, count: usize, low: f32, high: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            low + unit * (high - low)
        })
        .collect()
}
