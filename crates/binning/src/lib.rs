//! Spatio-temporal binning of satellite swath observations
//!
//! This crate aggregates pixel observations from many satellite passes onto a
//! global grid of cells ("bins"). It provides:
//!
//! - **Planetary grids**: equal-area (SEA) and plate carrée bin layouts
//! - **Pluggable aggregators**: mean, log-normal mean, outlier-aware mean,
//!   min/max, percentile, value-at-maximum, sum, raw mean, first value
//! - **Two-phase aggregation**: per pass (spatial) then across passes (temporal)
//! - **Spill streams**: completed spatial bins in a compact big-endian format
//!
//! # Architecture
//!
//! ```text
//! Observations (one pass)
//!      │
//!      ▼
//! SpatialBinner ──► PlanetaryGrid::bin_index(lat, lon)
//!      │
//!      ├─► BinManager::aggregate_spatial_bin   (every aggregator, own window)
//!      │
//!      └─► BinManager::complete_spatial_bin
//!               │
//!               ▼
//!          SpatialBinCollector (memory or spill file)
//!               │
//!               ▼
//! TemporalBinner ──► BinManager::aggregate_temporal_bin (per pass)
//!      │
//!      └─► BinManager::complete_temporal_bin
//!               │
//!               ▼
//!          compute_result ──► CellProcessor ──► reproject / write
//! ```
//!
//! # Example
//!
//! ```ignore
//! use binning::{bin_passes_parallel, BinningConfig};
//!
//! let config = BinningConfig::from_file("binning.yaml")?;
//! config.validate()?;
//! let grid = config.create_grid()?;
//! let manager = config.create_bin_manager()?;
//!
//! let bins = bin_passes_parallel(grid.as_ref(), &manager, &passes, &config.time_filter)?;
//! for bin in &bins {
//!     let result = manager.compute_result(bin)?;
//!     // ...
//! }
//! ```

pub mod aggregators;
pub mod bin;
pub mod binner;
pub mod cellprocessor;
pub mod config;
pub mod error;
pub mod grid;
pub mod manager;
pub mod observation;
pub mod reprojector;
pub mod spill;
pub mod time;
pub mod vector;

// Re-export commonly used types at crate root
pub use aggregators::{create_aggregator, Aggregator, AggregatorConfig, WeightFn};
pub use bin::{AggregatorContext, BinContext, SpatialBin, TemporalBin};
pub use binner::{bin_passes_parallel, SpatialBinner, SpatialBinnerStats, TemporalBinner};
pub use cellprocessor::{CellProcessor, CellProcessorConfig, Selection};
pub use config::BinningConfig;
pub use error::{BinningError, Result};
pub use grid::{GridKind, PlanetaryGrid, PlateCarreeGrid, SeaGrid, DEFAULT_NUM_ROWS};
pub use manager::{BinManager, NameUnifier};
pub use observation::{Observation, VariableContext};
pub use reprojector::{reproject, RasterRegion, RasterRenderer, TemporalBinRenderer};
pub use spill::{
    FileBackedBinCollector, MemoryBinCollector, SpatialBinCollector, SpillReader, SpillWriter,
};
pub use time::{DataPeriod, TimeFilter};
pub use vector::{GrowableVector, Vector, VectorMut};
