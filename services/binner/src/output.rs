//! JSON-lines cell results.

use std::io::Write;

use anyhow::Result;
use binning::{BinManager, PlanetaryGrid, TemporalBin};
use serde::Serialize;
use serde_json::{Map, Value};

/// One output line per cell.
#[derive(Debug, Serialize)]
struct CellRecord<'a> {
    index: i64,
    lat: f64,
    lon: f64,
    num_obs: i32,
    num_passes: i32,
    #[serde(flatten)]
    features: &'a Map<String, Value>,
}

/// Write every bin as a JSON object; NaN features become `null`.
pub fn write_cells<W: Write>(
    writer: &mut W,
    grid: &dyn PlanetaryGrid,
    manager: &BinManager,
    bins: &[TemporalBin],
) -> Result<usize> {
    let names = manager.result_feature_names();
    let mut features = Map::with_capacity(names.len());
    for bin in bins {
        let result = manager.compute_result(bin)?;
        features.clear();
        for (name, value) in names.iter().zip(result) {
            let value = if value.is_finite() {
                Value::from(value as f64)
            } else {
                Value::Null
            };
            features.insert(name.clone(), value);
        }
        let (lat, lon) = grid.center_lat_lon(bin.index());
        let record = CellRecord {
            index: bin.index(),
            lat,
            lon,
            num_obs: bin.num_obs,
            num_passes: bin.num_passes,
            features: &features,
        };
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(bins.len())
}
