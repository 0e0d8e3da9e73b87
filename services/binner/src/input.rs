//! JSON-lines observation feed.

use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use binning::Observation;
use serde::Deserialize;
use tracing::{debug, warn};

/// One line of the feed.
///
/// ```json
/// {"pass": 3, "lat": 45.1, "lon": 5.2, "mjd": 1096.5, "values": [0.8, null]}
/// ```
///
/// `null` values are read as NaN.
#[derive(Debug, Deserialize)]
struct ObservationRecord {
    #[serde(default)]
    pass: u32,
    lat: f64,
    lon: f64,
    #[serde(default)]
    mjd: f64,
    values: Vec<Option<f32>>,
}

impl ObservationRecord {
    fn into_observation(self) -> Observation {
        let values = self
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f32::NAN))
            .collect();
        Observation::new(self.lat, self.lon, self.mjd, values)
    }
}

/// Read observations grouped by pass, in ascending pass order.
///
/// Blank lines are skipped. Observations with fewer values than
/// `num_vars` are kept (missing values read as NaN).
pub fn read_passes<R: BufRead>(reader: R, num_vars: usize) -> Result<Vec<Vec<Observation>>> {
    let mut passes: BTreeMap<u32, Vec<Observation>> = BTreeMap::new();
    let mut short = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ObservationRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid observation on line {}", i + 1))?;
        if record.values.len() < num_vars {
            short += 1;
        }
        passes
            .entry(record.pass)
            .or_default()
            .push(record.into_observation());
    }
    if short > 0 {
        warn!(observations = short, expected = num_vars, "Observations with missing values");
    }
    debug!(passes = passes.len(), "Read observation feed");
    Ok(passes.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_passes() {
        let feed = r#"
{"pass": 1, "lat": 10.0, "lon": 20.0, "mjd": 3.5, "values": [1.0, 2.0]}
{"lat": 11.0, "lon": 21.0, "values": [null, 4.0]}

{"pass": 1, "lat": 12.0, "lon": 22.0, "values": [5.0]}
"#;
        let passes = read_passes(feed.as_bytes(), 2).unwrap();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].len(), 1);
        assert!(passes[0][0].values[0].is_nan());
        assert_eq!(passes[0][0].mjd, 0.0);
        assert_eq!(passes[1].len(), 2);
        assert_eq!(passes[1][0].mjd, 3.5);
        assert!(passes[1][1].get(1).is_nan());
    }

    #[test]
    fn test_invalid_line() {
        let feed = "{\"lat\": 1.0}\n";
        let err = read_passes(feed.as_bytes(), 1).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
