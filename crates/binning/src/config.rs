//! Configuration of a binning run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregators::AggregatorConfig;
use crate::cellprocessor::CellProcessorConfig;
use crate::error::{BinningError, Result};
use crate::grid::{GridKind, PlanetaryGrid, DEFAULT_NUM_ROWS};
use crate::manager::BinManager;
use crate::observation::VariableContext;
use crate::spill::{FileBackedBinCollector, MemoryBinCollector, SpatialBinCollector};
use crate::time::TimeFilter;

/// Configuration of a binning run.
///
/// ```yaml
/// grid: sea
/// num_rows: 2160
/// variables: [chl, tsm]
/// aggregators:
///   - type: AVG
///     var_name: chl
///   - type: PERCENTILE
///     var_name: tsm
///     percentage: 50
/// time_filter:
///   type: time_range
///   start_time: 2003-01-01
///   duration_days: 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinningConfig {
    /// Grid layout.
    pub grid: GridKind,

    /// Number of grid rows, must be even.
    pub num_rows: usize,

    /// Names of the observation values, in feed order.
    pub variables: Vec<String>,

    /// Aggregators in output order.
    pub aggregators: Vec<AggregatorConfig>,

    /// Optional post-processing of the output features.
    pub post_processor: Option<CellProcessorConfig>,

    /// Observation time filter.
    pub time_filter: TimeFilter,

    /// Spill completed spatial bins to disk once more than this many are
    /// buffered. `None` keeps everything in memory.
    pub spill_threshold: Option<usize>,

    /// Directory for spill files; defaults to the system temp directory.
    pub spill_dir: Option<PathBuf>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            grid: GridKind::Sea,
            num_rows: DEFAULT_NUM_ROWS,
            variables: Vec::new(),
            aggregators: Vec::new(),
            post_processor: None,
            time_filter: TimeFilter::None,
            spill_threshold: None,
            spill_dir: None,
        }
    }
}

impl BinningConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a `.json` file as JSON and anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_yaml_str(&text)?
        };
        debug!(path = %path.display(), aggregators = config.aggregators.len(), "Loaded binning config");
        Ok(config)
    }

    /// Apply `BINNING_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`:
    ///
    /// - `BINNING_GRID`
    /// - `BINNING_NUM_ROWS`
    /// - `BINNING_SPILL_THRESHOLD` (`0` or `none` disables spilling)
    /// - `BINNING_SPILL_DIR`
    /// - `BINNING_TIME_FILTER` (`none` or `<start_time>/<duration_days>`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("BINNING_GRID") {
            self.grid = GridKind::from_str(&val)
                .ok_or_else(|| BinningError::invalid_parameter("BINNING_GRID", format!("unknown grid '{}'", val)))?;
        }

        if let Some(val) = lookup("BINNING_NUM_ROWS") {
            self.num_rows = val.trim().parse().map_err(|_| {
                BinningError::invalid_parameter("BINNING_NUM_ROWS", format!("'{}' is not a row count", val))
            })?;
        }

        if let Some(val) = lookup("BINNING_SPILL_THRESHOLD") {
            let val = val.trim();
            self.spill_threshold = if val.eq_ignore_ascii_case("none") {
                None
            } else {
                match val.parse::<usize>() {
                    Ok(0) => None,
                    Ok(n) => Some(n),
                    Err(_) => {
                        return Err(BinningError::invalid_parameter(
                            "BINNING_SPILL_THRESHOLD",
                            format!("'{}' is not a bin count", val),
                        ))
                    }
                }
            };
        }

        if let Some(val) = lookup("BINNING_SPILL_DIR") {
            self.spill_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("BINNING_TIME_FILTER") {
            self.time_filter = val.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_rows < 2 || self.num_rows % 2 != 0 {
            return Err(BinningError::invalid_parameter(
                "num_rows",
                format!("must be even and >= 2, got {}", self.num_rows),
            ));
        }

        if self.variables.is_empty() {
            return Err(BinningError::config("variables must not be empty"));
        }

        if self.aggregators.is_empty() {
            return Err(BinningError::config("at least one aggregator is required"));
        }

        for aggregator in &self.aggregators {
            aggregator.validate()?;
        }

        self.time_filter.validate()?;

        if self.spill_threshold == Some(0) {
            return Err(BinningError::invalid_parameter(
                "spill_threshold",
                "must be > 0, omit it to keep bins in memory",
            ));
        }

        Ok(())
    }

    pub fn variable_context(&self) -> Result<VariableContext> {
        VariableContext::new(self.variables.iter().cloned())
    }

    pub fn create_grid(&self) -> Result<Box<dyn PlanetaryGrid>> {
        self.grid.create(self.num_rows)
    }

    pub fn create_bin_manager(&self) -> Result<BinManager> {
        BinManager::from_config(
            &self.variable_context()?,
            &self.aggregators,
            self.post_processor.as_ref(),
        )
    }

    /// Collector for completed spatial bins according to the spill settings.
    pub fn create_collector(&self) -> Box<dyn SpatialBinCollector> {
        match self.spill_threshold {
            Some(threshold) => {
                let collector = FileBackedBinCollector::new(threshold);
                match &self.spill_dir {
                    Some(dir) => Box::new(collector.with_dir(dir)),
                    None => Box::new(collector),
                }
            }
            None => Box::new(MemoryBinCollector::new()),
        }
    }
}
