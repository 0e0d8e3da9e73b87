//! Reprojection of temporal bins onto a global lat/lon raster.
//!
//! The global raster of a grid with `n` rows is `2n × n` pixels of
//! `180 / n` degrees, with pixel (0, 0) at the north-west corner. Every
//! pixel center is mapped to the bin containing it. Pixels whose cell has no
//! bin are reported as missing, which is distinct from a bin whose features
//! are all NaN.

use std::collections::HashMap;

use tracing::debug;

use crate::bin::TemporalBin;
use crate::error::{BinningError, Result};
use crate::grid::PlanetaryGrid;
use crate::manager::BinManager;

/// A rectangular window of the global raster, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RasterRegion {
    /// The full `2n × n` raster of a grid with `num_rows` rows.
    pub fn global(num_rows: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: 2 * num_rows,
            height: num_rows,
        }
    }

    /// Pixel window covering the geographic box, clipped to the globe.
    pub fn from_bbox(num_rows: usize, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        let res = 180.0 / num_rows as f64;
        let clamp_x = |lon: f64| (((lon + 180.0) / res).floor().max(0.0) as usize).min(2 * num_rows);
        let clamp_y = |lat: f64| (((90.0 - lat) / res).floor().max(0.0) as usize).min(num_rows);
        let x0 = clamp_x(min_lon);
        let x1 = clamp_x(max_lon).max(x0);
        let y0 = clamp_y(max_lat);
        let y1 = clamp_y(min_lat).max(y0);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Receives reprojected pixels. Coordinates are relative to the region.
pub trait TemporalBinRenderer {
    fn raster_region(&self) -> RasterRegion;

    fn begin(&mut self, result_feature_names: &[String]) -> Result<()>;

    fn render_bin(&mut self, x: usize, y: usize, bin: &TemporalBin, result: &[f32]) -> Result<()>;

    fn render_missing_bin(&mut self, x: usize, y: usize) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

/// Walk the renderer's region row by row and render every pixel.
pub fn reproject(
    grid: &dyn PlanetaryGrid,
    manager: &BinManager,
    bins: &[TemporalBin],
    renderer: &mut dyn TemporalBinRenderer,
) -> Result<()> {
    let num_rows = grid.num_rows();
    let region = renderer.raster_region();
    if region.x + region.width > 2 * num_rows || region.y + region.height > num_rows {
        return Err(BinningError::config(format!(
            "raster region {:?} exceeds the {}x{} global raster",
            region,
            2 * num_rows,
            num_rows
        )));
    }

    let by_index: HashMap<i64, &TemporalBin> = bins.iter().map(|b| (b.index(), b)).collect();
    let mut results: HashMap<i64, Vec<f32>> = HashMap::new();
    let res = 180.0 / num_rows as f64;
    let mut missing = 0usize;

    renderer.begin(manager.result_feature_names())?;
    for y in 0..region.height {
        let lat = 90.0 - (region.y + y) as f64 * res - 0.5 * res;
        for x in 0..region.width {
            let lon = -180.0 + (region.x + x) as f64 * res + 0.5 * res;
            let index = grid.bin_index(lat, lon);
            match by_index.get(&index) {
                Some(bin) => {
                    if !results.contains_key(&index) {
                        results.insert(index, manager.compute_result(bin)?);
                    }
                    renderer.render_bin(x, y, bin, &results[&index])?;
                }
                None => {
                    missing += 1;
                    renderer.render_missing_bin(x, y)?;
                }
            }
        }
    }
    renderer.end()?;

    debug!(
        width = region.width,
        height = region.height,
        bins = results.len(),
        missing_pixels = missing,
        "Reprojected temporal bins"
    );
    Ok(())
}

/// In-memory renderer with one row-major band per result feature.
///
/// Feature bands are NaN where no bin exists; the `num_obs` and `num_passes`
/// bands are 0 there.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    region: RasterRegion,
    band_names: Vec<String>,
    bands: Vec<Vec<f32>>,
    num_obs: Vec<i32>,
    num_passes: Vec<i32>,
}

impl RasterRenderer {
    pub fn new(region: RasterRegion) -> Self {
        Self {
            region,
            band_names: Vec::new(),
            bands: Vec::new(),
            num_obs: Vec::new(),
            num_passes: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.region.width
    }

    pub fn height(&self) -> usize {
        self.region.height
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Band of the result feature `name`.
    pub fn band(&self, name: &str) -> Option<&[f32]> {
        self.band_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.bands[i].as_slice())
    }

    pub fn num_obs(&self) -> &[i32] {
        &self.num_obs
    }

    pub fn num_passes(&self) -> &[i32] {
        &self.num_passes
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.region.width + x
    }
}

impl TemporalBinRenderer for RasterRenderer {
    fn raster_region(&self) -> RasterRegion {
        self.region
    }

    fn begin(&mut self, result_feature_names: &[String]) -> Result<()> {
        let n = self.region.pixel_count();
        self.band_names = result_feature_names.to_vec();
        self.bands = vec![vec![f32::NAN; n]; result_feature_names.len()];
        self.num_obs = vec![0; n];
        self.num_passes = vec![0; n];
        Ok(())
    }

    fn render_bin(&mut self, x: usize, y: usize, bin: &TemporalBin, result: &[f32]) -> Result<()> {
        if result.len() != self.bands.len() {
            return Err(BinningError::FeatureCountMismatch {
                expected: self.bands.len(),
                actual: result.len(),
            });
        }
        let i = self.offset(x, y);
        for (band, &value) in self.bands.iter_mut().zip(result) {
            band[i] = value;
        }
        self.num_obs[i] = bin.num_obs;
        self.num_passes[i] = bin.num_passes;
        Ok(())
    }

    fn render_missing_bin(&mut self, _x: usize, _y: usize) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::AggregatorConfig;
    use crate::grid::{PlateCarreeGrid, SeaGrid};
    use crate::observation::{Observation, VariableContext};

    #[derive(Default)]
    struct CountingRenderer {
        region: Option<RasterRegion>,
        rendered: Vec<(usize, usize, i64)>,
        results: Vec<Vec<f32>>,
        missing: usize,
        missing_pixels: Vec<(usize, usize)>,
        ended: bool,
    }

    impl TemporalBinRenderer for CountingRenderer {
        fn raster_region(&self) -> RasterRegion {
            self.region.unwrap_or(RasterRegion::global(6))
        }

        fn begin(&mut self, _names: &[String]) -> Result<()> {
            Ok(())
        }

        fn render_bin(&mut self, x: usize, y: usize, bin: &TemporalBin, result: &[f32]) -> Result<()> {
            self.rendered.push((x, y, bin.index()));
            self.results.push(result.to_vec());
            Ok(())
        }

        fn render_missing_bin(&mut self, x: usize, y: usize) -> Result<()> {
            self.missing += 1;
            self.missing_pixels.push((x, y));
            Ok(())
        }

        fn end(&mut self) -> Result<()> {
            self.ended = true;
            Ok(())
        }
    }

    fn manager() -> BinManager {
        let ctx = VariableContext::new(["sst"]).unwrap();
        BinManager::from_config(&ctx, &[AggregatorConfig::new("MIN_MAX", "sst")], None).unwrap()
    }

    fn single_bin(manager: &BinManager, index: i64, value: f32) -> TemporalBin {
        let mut sbin = manager.create_spatial_bin(index);
        manager
            .aggregate_spatial_bin(&Observation::new(0.0, 0.0, 0.0, vec![value]), &mut sbin)
            .unwrap();
        manager.complete_spatial_bin(&mut sbin).unwrap();
        let mut tbin = manager.create_temporal_bin(index).unwrap();
        manager.aggregate_temporal_bin(&sbin, &mut tbin).unwrap();
        manager.complete_temporal_bin(&mut tbin).unwrap();
        tbin
    }

    #[test]
    fn test_empty_cells_render_as_missing() {
        let grid = SeaGrid::new(6).unwrap();
        let manager = manager();
        let bins = vec![single_bin(&manager, 29, 4.0)];
        let mut renderer = CountingRenderer::default();
        reproject(&grid, &manager, &bins, &mut renderer).unwrap();

        assert!(renderer.ended);
        assert_eq!(renderer.rendered.len() + renderer.missing, 12 * 6);
        assert!(!renderer.rendered.is_empty());
        assert!(renderer.rendered.iter().all(|&(_, _, i)| i == 29));
        // bin 29 spans (-30..0 lat, 0..30 lon): pixels x = 6, y = 3
        assert_eq!(renderer.rendered, vec![(6, 3, 29)]);
    }

    #[test]
    fn test_all_nan_bin_is_not_missing() {
        let grid = SeaGrid::new(6).unwrap();
        let ctx = VariableContext::new(["sst"]).unwrap();
        let manager =
            BinManager::from_config(&ctx, &[AggregatorConfig::new("AVG", "sst")], None).unwrap();
        let bins = vec![single_bin(&manager, 29, f32::NAN)];
        assert_eq!(bins[0].num_obs, 1);

        let mut renderer = CountingRenderer::default();
        reproject(&grid, &manager, &bins, &mut renderer).unwrap();

        assert_eq!(renderer.rendered, vec![(6, 3, 29)]);
        assert_eq!(renderer.results.len(), 1);
        assert_eq!(renderer.results[0].len(), 2);
        assert!(renderer.results[0].iter().all(|v| v.is_nan()));
        assert!(!renderer.missing_pixels.contains(&(6, 3)));
        assert_eq!(renderer.missing, 12 * 6 - 1);
    }

    #[test]
    fn test_raster_renderer_bands() {
        let grid = PlateCarreeGrid::new(6).unwrap();
        let manager = manager();
        let index = grid.bin_index(45.0, -75.0);
        let bins = vec![single_bin(&manager, index, 7.5)];
        let mut renderer = RasterRenderer::new(RasterRegion::global(6));
        reproject(&grid, &manager, &bins, &mut renderer).unwrap();

        assert_eq!(renderer.band_names(), ["sst_min", "sst_max"]);
        let band = renderer.band("sst_max").unwrap();
        assert_eq!(band.len(), 72);
        let filled: Vec<usize> = (0..72).filter(|&i| !band[i].is_nan()).collect();
        assert_eq!(filled.len(), 1);
        assert_eq!(band[filled[0]], 7.5);
        assert_eq!(renderer.num_obs()[filled[0]], 1);
        assert_eq!(renderer.num_passes().iter().sum::<i32>(), 1);
    }

    #[test]
    fn test_subregion() {
        let region = RasterRegion::from_bbox(6, 0.0, -30.0, 30.0, 0.0);
        assert_eq!(
            region,
            RasterRegion {
                x: 6,
                y: 3,
                width: 1,
                height: 1
            }
        );
        let grid = SeaGrid::new(6).unwrap();
        let manager = manager();
        let bins = vec![single_bin(&manager, 29, 1.0)];
        let mut renderer = RasterRenderer::new(region);
        reproject(&grid, &manager, &bins, &mut renderer).unwrap();
        assert_eq!(renderer.band("sst_min").unwrap(), &[1.0]);
    }

    #[test]
    fn test_region_outside_raster() {
        let grid = SeaGrid::new(6).unwrap();
        let mut renderer = RasterRenderer::new(RasterRegion {
            x: 10,
            y: 0,
            width: 4,
            height: 1,
        });
        assert!(reproject(&grid, &manager(), &[], &mut renderer).is_err());
    }
}
