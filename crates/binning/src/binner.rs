//! Spatial and temporal binning drivers.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::bin::{SpatialBin, TemporalBin};
use crate::error::Result;
use crate::grid::PlanetaryGrid;
use crate::manager::BinManager;
use crate::observation::Observation;
use crate::spill::SpatialBinCollector;
use crate::time::TimeFilter;

/// Observation counters of a spatial binner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialBinnerStats {
    /// Observations routed to a bin.
    pub binned: u64,
    /// Observations skipped because of a non-finite position.
    pub invalid_position: u64,
    /// Observations skipped by the time filter.
    pub outside_period: u64,
}

/// Bins the observations of a single pass.
#[derive(Debug)]
pub struct SpatialBinner<'a> {
    grid: &'a dyn PlanetaryGrid,
    manager: &'a BinManager,
    time_filter: &'a TimeFilter,
    bins: HashMap<i64, SpatialBin>,
    stats: SpatialBinnerStats,
}

impl<'a> SpatialBinner<'a> {
    pub fn new(grid: &'a dyn PlanetaryGrid, manager: &'a BinManager, time_filter: &'a TimeFilter) -> Self {
        Self {
            grid,
            manager,
            time_filter,
            bins: HashMap::new(),
            stats: SpatialBinnerStats::default(),
        }
    }

    pub fn process_observation(&mut self, observation: &Observation) -> Result<()> {
        if !observation.has_valid_position() {
            self.stats.invalid_position += 1;
            return Ok(());
        }
        if !self.time_filter.accepts(observation.lon, observation.mjd) {
            self.stats.outside_period += 1;
            return Ok(());
        }
        let index = self.grid.bin_index(observation.lat, observation.lon);
        let manager = self.manager;
        let bin = self
            .bins
            .entry(index)
            .or_insert_with(|| manager.create_spatial_bin(index));
        manager.aggregate_spatial_bin(observation, bin)?;
        self.stats.binned += 1;
        Ok(())
    }

    pub fn process_observations<'o, I>(&mut self, observations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'o Observation>,
    {
        for observation in observations {
            self.process_observation(observation)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> SpatialBinnerStats {
        self.stats
    }

    /// Number of bins touched so far.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Complete every bin of the pass; bins are sorted by index.
    pub fn complete(self) -> Result<Vec<SpatialBin>> {
        let mut bins: Vec<SpatialBin> = self.bins.into_values().collect();
        bins.sort_unstable_by_key(|b| b.index);
        for bin in &mut bins {
            self.manager.complete_spatial_bin(bin)?;
        }
        debug!(
            bins = bins.len(),
            binned = self.stats.binned,
            invalid_position = self.stats.invalid_position,
            outside_period = self.stats.outside_period,
            "Completed spatial binning of pass"
        );
        Ok(bins)
    }
}

/// Merges completed spatial bins of many passes into temporal bins.
#[derive(Debug)]
pub struct TemporalBinner<'a> {
    manager: &'a BinManager,
    bins: BTreeMap<i64, TemporalBin>,
}

impl<'a> TemporalBinner<'a> {
    pub fn new(manager: &'a BinManager) -> Self {
        Self {
            manager,
            bins: BTreeMap::new(),
        }
    }

    pub fn aggregate(&mut self, spatial: &SpatialBin) -> Result<()> {
        let temporal = match self.bins.entry(spatial.index) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(self.manager.create_temporal_bin(spatial.index)?),
        };
        self.manager.aggregate_temporal_bin(spatial, temporal)
    }

    pub fn aggregate_all<'s, I>(&mut self, bins: I) -> Result<()>
    where
        I: IntoIterator<Item = &'s SpatialBin>,
    {
        for bin in bins {
            self.aggregate(bin)?;
        }
        Ok(())
    }

    /// Merge everything held by `collector`.
    pub fn aggregate_collected(&mut self, collector: &mut dyn SpatialBinCollector) -> Result<()> {
        collector.replay(&mut |bin| self.aggregate(&bin))
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Complete every temporal bin; bins are sorted by index.
    pub fn complete(self) -> Result<Vec<TemporalBin>> {
        let mut bins: Vec<TemporalBin> = self.bins.into_values().collect();
        for bin in &mut bins {
            self.manager.complete_temporal_bin(bin)?;
        }
        Ok(bins)
    }
}

/// Bin independent passes in parallel and merge them into temporal bins.
///
/// Passes are spatially binned on the rayon pool; the merge runs serially in
/// pass order.
pub fn bin_passes_parallel(
    grid: &dyn PlanetaryGrid,
    manager: &BinManager,
    passes: &[Vec<Observation>],
    time_filter: &TimeFilter,
) -> Result<Vec<TemporalBin>> {
    let spatial: Vec<(Vec<SpatialBin>, SpatialBinnerStats)> = passes
        .par_iter()
        .map(|pass| -> Result<_> {
            let mut binner = SpatialBinner::new(grid, manager, time_filter);
            binner.process_observations(pass)?;
            let stats = binner.stats();
            Ok((binner.complete()?, stats))
        })
        .collect::<Result<_>>()?;

    let mut totals = SpatialBinnerStats::default();
    let mut temporal = TemporalBinner::new(manager);
    for (bins, stats) in &spatial {
        totals.binned += stats.binned;
        totals.invalid_position += stats.invalid_position;
        totals.outside_period += stats.outside_period;
        temporal.aggregate_all(bins)?;
    }
    let bins = temporal.complete()?;
    info!(
        passes = passes.len(),
        cells = bins.len(),
        binned = totals.binned,
        invalid_position = totals.invalid_position,
        outside_period = totals.outside_period,
        "Binned passes"
    );
    Ok(bins)
}
