//! Bin lifecycle orchestration over an ordered list of aggregators.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::aggregators::{create_aggregator, Aggregator, AggregatorConfig};
use crate::bin::{SpatialBin, TemporalBin};
use crate::cellprocessor::{CellProcessor, CellProcessorConfig};
use crate::error::{BinningError, Result};
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Position of one aggregator's features in a flat feature array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    offset: usize,
    len: usize,
}

/// Compute consecutive windows from feature counts.
fn layout(lens: impl Iterator<Item = usize>) -> (Vec<Window>, usize) {
    let mut offset = 0;
    let windows = lens
        .map(|len| {
            let w = Window { offset, len };
            offset += len;
            w
        })
        .collect();
    (windows, offset)
}

/// Makes names unique by appending `_1`, `_2`, ... to repeated names.
#[derive(Debug, Default)]
pub struct NameUnifier {
    counters: HashMap<String, usize>,
    used: HashSet<String>,
}

impl NameUnifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name` on first use, then `name_1`, `name_2`, ...
    pub fn unify_name(&mut self, name: &str) -> String {
        if self.used.insert(name.to_string()) {
            self.counters.insert(name.to_string(), 0);
            return name.to_string();
        }
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}_{}", name, counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Drives all aggregators through the bin lifecycle.
///
/// Feature windows are computed once from the aggregators' declared feature
/// names, in registration order. Every aggregator only ever sees its own
/// windows and its own bin context slot.
#[derive(Debug)]
pub struct BinManager {
    aggregators: Vec<Box<dyn Aggregator>>,
    context_keys: Vec<String>,
    spatial: Vec<Window>,
    temporal: Vec<Window>,
    output: Vec<Window>,
    spatial_feature_count: usize,
    temporal_feature_count: usize,
    output_feature_count: usize,
    output_feature_names: Vec<String>,
    cell_processor: Option<Box<dyn CellProcessor>>,
}

impl BinManager {
    /// Create a manager without post-processing.
    pub fn new(aggregators: Vec<Box<dyn Aggregator>>) -> Self {
        let (spatial, spatial_feature_count) =
            layout(aggregators.iter().map(|a| a.spatial_feature_names().len()));
        let (temporal, temporal_feature_count) =
            layout(aggregators.iter().map(|a| a.temporal_feature_names().len()));
        let (output, output_feature_count) =
            layout(aggregators.iter().map(|a| a.output_feature_names().len()));

        let mut unifier = NameUnifier::new();
        let output_feature_names = aggregators
            .iter()
            .flat_map(|a| a.output_feature_names().iter())
            .map(|name| unifier.unify_name(name))
            .collect();

        let mut key_unifier = NameUnifier::new();
        let context_keys = aggregators
            .iter()
            .map(|a| key_unifier.unify_name(a.name()))
            .collect();

        Self {
            aggregators,
            context_keys,
            spatial,
            temporal,
            output,
            spatial_feature_count,
            temporal_feature_count,
            output_feature_count,
            output_feature_names,
            cell_processor: None,
        }
    }

    /// Create a manager with a post-processing stage.
    pub fn with_cell_processor(
        aggregators: Vec<Box<dyn Aggregator>>,
        config: &CellProcessorConfig,
    ) -> Result<Self> {
        let mut manager = Self::new(aggregators);
        manager.cell_processor = Some(config.create(&manager.output_feature_names)?);
        Ok(manager)
    }

    /// Build aggregators from their configurations.
    pub fn from_config(
        var_ctx: &VariableContext,
        aggregators: &[AggregatorConfig],
        cell_processor: Option<&CellProcessorConfig>,
    ) -> Result<Self> {
        let aggregators = aggregators
            .iter()
            .map(|config| create_aggregator(var_ctx, config))
            .collect::<Result<Vec<_>>>()?;
        let manager = match cell_processor {
            Some(config) => Self::with_cell_processor(aggregators, config)?,
            None => Self::new(aggregators),
        };
        debug!(
            aggregators = manager.aggregator_count(),
            spatial_features = manager.spatial_feature_count,
            temporal_features = manager.temporal_feature_count,
            result_features = manager.result_feature_count(),
            "Created bin manager"
        );
        Ok(manager)
    }

    pub fn aggregator_count(&self) -> usize {
        self.aggregators.len()
    }

    pub fn aggregator(&self, index: usize) -> &dyn Aggregator {
        self.aggregators[index].as_ref()
    }

    pub fn spatial_feature_count(&self) -> usize {
        self.spatial_feature_count
    }

    pub fn temporal_feature_count(&self) -> usize {
        self.temporal_feature_count
    }

    pub fn output_feature_count(&self) -> usize {
        self.output_feature_count
    }

    /// Unified output names of all aggregators, before post-processing.
    pub fn output_feature_names(&self) -> &[String] {
        &self.output_feature_names
    }

    /// Names of the features returned by [`compute_result`](Self::compute_result).
    pub fn result_feature_names(&self) -> &[String] {
        match &self.cell_processor {
            Some(p) => p.output_feature_names(),
            None => &self.output_feature_names,
        }
    }

    pub fn result_feature_count(&self) -> usize {
        self.result_feature_names().len()
    }

    /// Whether any aggregator keeps per-sample data in the spatial phase.
    pub fn has_growable_spatial_data(&self) -> bool {
        self.aggregators
            .iter()
            .any(|a| a.requires_growable_spatial_data())
    }

    pub fn create_spatial_bin(&self, index: i64) -> SpatialBin {
        let mut bin = SpatialBin::new(index, self.spatial_feature_count);
        for (i, agg) in self.aggregators.iter().enumerate() {
            let w = self.spatial[i];
            let mut ctx = bin.context.scoped(&self.context_keys[i]);
            agg.init_spatial(&mut ctx, &mut VectorMut::window(&mut bin.feature_values, w.offset, w.len));
        }
        bin
    }

    /// Route one observation to every aggregator.
    pub fn aggregate_spatial_bin(&self, observation: &Observation, bin: &mut SpatialBin) -> Result<()> {
        check_len(self.spatial_feature_count, bin.feature_values.len())?;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let w = self.spatial[i];
            let mut ctx = bin.context.scoped(&self.context_keys[i]);
            agg.aggregate_spatial(
                &mut ctx,
                observation,
                &mut VectorMut::window(&mut bin.feature_values, w.offset, w.len),
            );
        }
        bin.num_obs += 1;
        Ok(())
    }

    pub fn complete_spatial_bin(&self, bin: &mut SpatialBin) -> Result<()> {
        check_len(self.spatial_feature_count, bin.feature_values.len())?;
        let num_obs = bin.num_obs;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let w = self.spatial[i];
            let mut ctx = bin.context.scoped(&self.context_keys[i]);
            agg.complete_spatial(
                &mut ctx,
                num_obs,
                &mut VectorMut::window(&mut bin.feature_values, w.offset, w.len),
            );
        }
        Ok(())
    }

    /// Create a temporal bin; `index` must be non-negative.
    pub fn create_temporal_bin(&self, index: i64) -> Result<TemporalBin> {
        let mut bin = TemporalBin::new(index, self.temporal_feature_count)?;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let w = self.temporal[i];
            let mut ctx = bin.context.scoped(&self.context_keys[i]);
            agg.init_temporal(&mut ctx, &mut VectorMut::window(&mut bin.feature_values, w.offset, w.len));
        }
        Ok(bin)
    }

    /// Merge a completed spatial bin into `temporal`.
    pub fn aggregate_temporal_bin(&self, spatial: &SpatialBin, temporal: &mut TemporalBin) -> Result<()> {
        check_len(self.spatial_feature_count, spatial.feature_values.len())?;
        check_len(self.temporal_feature_count, temporal.feature_values.len())?;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let sw = self.spatial[i];
            let tw = self.temporal[i];
            let mut ctx = temporal.context.scoped(&self.context_keys[i]);
            agg.aggregate_temporal(
                &mut ctx,
                &Vector::window(&spatial.feature_values, sw.offset, sw.len),
                spatial.num_obs,
                &mut VectorMut::window(&mut temporal.feature_values, tw.offset, tw.len),
            );
        }
        temporal.num_obs += spatial.num_obs;
        temporal.num_passes += 1;
        Ok(())
    }

    pub fn complete_temporal_bin(&self, bin: &mut TemporalBin) -> Result<()> {
        check_len(self.temporal_feature_count, bin.feature_values.len())?;
        let num_passes = bin.num_passes;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let w = self.temporal[i];
            let mut ctx = bin.context.scoped(&self.context_keys[i]);
            agg.complete_temporal(
                &mut ctx,
                num_passes,
                &mut VectorMut::window(&mut bin.feature_values, w.offset, w.len),
            );
        }
        Ok(())
    }

    /// Write the output features of `bin` into `output`.
    pub fn compute_output(&self, bin: &TemporalBin, output: &mut [f32]) -> Result<()> {
        check_len(self.temporal_feature_count, bin.feature_values.len())?;
        check_len(self.output_feature_count, output.len())?;
        for (i, agg) in self.aggregators.iter().enumerate() {
            let tw = self.temporal[i];
            let ow = self.output[i];
            agg.compute_output(
                &Vector::window(&bin.feature_values, tw.offset, tw.len),
                &mut VectorMut::window(output, ow.offset, ow.len),
            );
        }
        Ok(())
    }

    /// Output features of `bin` after post-processing.
    pub fn compute_result(&self, bin: &TemporalBin) -> Result<Vec<f32>> {
        let mut output = vec![0.0; self.output_feature_count];
        self.compute_output(bin, &mut output)?;
        match &self.cell_processor {
            Some(processor) => {
                let mut result = vec![0.0; processor.output_feature_names().len()];
                processor.compute(&Vector::new(&output), &mut VectorMut::new(&mut result));
                Ok(result)
            }
            None => Ok(output),
        }
    }

    /// The spatial features of aggregator `index`.
    pub fn spatial_vector<'a>(&self, bin: &'a SpatialBin, index: usize) -> Vector<'a> {
        let w = self.spatial[index];
        Vector::window(&bin.feature_values, w.offset, w.len)
    }

    /// The temporal features of aggregator `index`.
    pub fn temporal_vector<'a>(&self, bin: &'a TemporalBin, index: usize) -> Vector<'a> {
        let w = self.temporal[index];
        Vector::window(&bin.feature_values, w.offset, w.len)
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(BinningError::FeatureCountMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::{
        AggregatorAverage, AggregatorAverageML, AggregatorMinMax, AggregatorOnMaxSet,
    };
    use test_utils::assert_approx_eq;

    fn abc() -> VariableContext {
        VariableContext::new(["a", "b", "c"]).unwrap()
    }

    fn obs(values: &[f32]) -> Observation {
        Observation::new(23.8, 19.09, 0.0, values.to_vec())
    }

    #[test]
    fn test_bin_creation() {
        let ctx = abc();
        let manager = BinManager::new(vec![
            Box::new(AggregatorAverage::new(&ctx, "c", None, 0.0, false, false).unwrap()),
            Box::new(AggregatorAverageML::new(&ctx, "b", None, 0.5).unwrap()),
            Box::new(AggregatorMinMax::new(&ctx, "a", Some("a")).unwrap()),
            Box::new(AggregatorOnMaxSet::new(&ctx, "c", Some("c"), &["a", "b"]).unwrap()),
        ]);
        assert_eq!(manager.aggregator_count(), 4);
        assert!(!manager.has_growable_spatial_data());

        let sbin = manager.create_spatial_bin(42);
        assert_eq!(sbin.index, 42);
        assert_eq!(sbin.feature_values.len(), 2 + 2 + 2 + 4);

        let tbin = manager.create_temporal_bin(42).unwrap();
        assert_eq!(tbin.index(), 42);
        assert_eq!(tbin.feature_values.len(), 3 + 3 + 2 + 4);

        assert_eq!(manager.output_feature_count(), 2 + 4 + 2 + 4);
    }

    #[test]
    fn test_negative_temporal_index_rejected() {
        let manager = BinManager::new(vec![]);
        assert!(matches!(
            manager.create_temporal_bin(-3),
            Err(BinningError::InvalidBinIndex(-3))
        ));
    }

    #[test]
    fn test_name_unifying() {
        let mut unifier = NameUnifier::new();
        assert_eq!(unifier.unify_name("expression_p90"), "expression_p90");
        assert_eq!(unifier.unify_name("expression_p90"), "expression_p90_1");
        assert_eq!(unifier.unify_name("expression_p90"), "expression_p90_2");
        assert_eq!(unifier.unify_name("expression_p50"), "expression_p50");
        assert_eq!(unifier.unify_name("expression_p50"), "expression_p50_1");
    }

    #[test]
    fn test_name_unifier_skips_taken_suffix() {
        let mut unifier = NameUnifier::new();
        assert_eq!(unifier.unify_name("x_1"), "x_1");
        assert_eq!(unifier.unify_name("x"), "x");
        assert_eq!(unifier.unify_name("x"), "x_2");
    }

    #[test]
    fn test_duplicate_output_names_unified() {
        let ctx = VariableContext::new(["x"]).unwrap();
        let manager = BinManager::new(vec![
            Box::new(AggregatorAverage::new(&ctx, "x", None, 0.0, false, false).unwrap()),
            Box::new(AggregatorAverage::new(&ctx, "x", None, 1.0, false, false).unwrap()),
        ]);
        assert_eq!(
            manager.result_feature_names(),
            ["x_mean", "x_sigma", "x_mean_1", "x_sigma_1"]
        );
    }

    #[test]
    fn test_result_feature_names_without_post_processor() {
        let ctx = VariableContext::new(["d"]).unwrap();
        let manager = BinManager::new(vec![Box::new(
            AggregatorAverage::new(&ctx, "d", None, 0.0, false, false).unwrap(),
        )]);
        assert_eq!(manager.result_feature_names(), ["d_mean", "d_sigma"]);
    }

    #[test]
    fn test_result_feature_names_with_post_processor() {
        let ctx = VariableContext::new(["e", "f"]).unwrap();
        let manager = BinManager::with_cell_processor(
            vec![Box::new(AggregatorMinMax::new(&ctx, "e", Some("out")).unwrap())],
            &CellProcessorConfig::selection(["out_min"]),
        )
        .unwrap();
        assert_eq!(manager.result_feature_names(), ["out_min"]);
        assert_eq!(manager.result_feature_count(), 1);

        let err = BinManager::with_cell_processor(
            vec![Box::new(AggregatorMinMax::new(&ctx, "f", None).unwrap())],
            &CellProcessorConfig::selection(["out_max"]),
        );
        assert!(err.is_err());
    }

    fn three_avgs() -> BinManager {
        let ctx = VariableContext::new(["tcwv", "tcwv_uncertainty"]).unwrap();
        BinManager::from_config(
            &ctx,
            &[
                AggregatorConfig::new("AVG", "tcwv")
                    .with_weight_coeff(1.0)
                    .with_output_counts(true),
                AggregatorConfig::new("AVG", "tcwv_uncertainty")
                    .with_target_name("tcwv_unc")
                    .with_weight_coeff(1.0),
                AggregatorConfig::new("AVG", "tcwv_uncertainty")
                    .with_target_name("tcwv_unc_sum")
                    .with_weight_coeff(1.0)
                    .with_output_sums(true),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_aggregation_with_three_avgs() {
        let manager = three_avgs();
        let mut sbin = manager.create_spatial_bin(20);
        assert_eq!(sbin.feature_values.len(), 7);

        for values in [
            [35.4, 1.76],
            [35.4, 1.76],
            [f32::NAN, f32::NAN],
            [f32::NAN, f32::NAN],
            [35.4, 1.76],
        ] {
            manager.aggregate_spatial_bin(&obs(&values), &mut sbin).unwrap();
        }
        manager.complete_spatial_bin(&mut sbin).unwrap();
        assert_eq!(sbin.num_obs, 5);

        let f = &sbin.feature_values;
        assert_approx_eq!(f[0], 35.400001525878906, 1e-8);
        assert_approx_eq!(f[1], 1253.16015625, 1e-8);
        assert_approx_eq!(f[2], 3.0, 1e-8);
        assert_approx_eq!(f[3], 1.7599998712539673, 1e-8);
        assert_approx_eq!(f[4], 3.097599983215332, 1e-8);
        assert_approx_eq!(f[5], 1.7599998712539673, 1e-8);
        assert_approx_eq!(f[6], 3.097599983215332, 1e-8);

        let mut tbin = manager.create_temporal_bin(20).unwrap();
        manager.aggregate_temporal_bin(&sbin, &mut tbin).unwrap();
        manager.complete_temporal_bin(&mut tbin).unwrap();
        assert_eq!(tbin.num_obs, 5);
        assert_eq!(tbin.num_passes, 1);

        let mut out = vec![0.0; 8];
        manager.compute_output(&tbin, &mut out).unwrap();
        assert_approx_eq!(out[0], 35.400001525878906, 1e-8);
        assert_approx_eq!(out[1], 0.012500000186264515, 1e-8);
        assert_approx_eq!(out[2], 3.0, 1e-8);
        assert_approx_eq!(out[3], 1.7599998712539673, 1e-8);
        assert_approx_eq!(out[4], 7.213353528641164E-4, 1e-8);
        assert_approx_eq!(out[5], 8.799999237060547, 1e-8);
        assert_approx_eq!(out[6], 15.48799991607666, 1e-8);
        assert_approx_eq!(out[7], 5.0, 1e-8);

        assert_eq!(manager.compute_result(&tbin).unwrap(), out);
    }

    #[test]
    fn test_feature_count_mismatch() {
        let manager = three_avgs();
        let mut sbin = SpatialBin::new(1, 6);
        assert!(matches!(
            manager.aggregate_spatial_bin(&obs(&[1.0, 1.0]), &mut sbin),
            Err(BinningError::FeatureCountMismatch { expected: 7, actual: 6 })
        ));
        let tbin = manager.create_temporal_bin(1).unwrap();
        let mut out = vec![0.0; 9];
        assert!(manager.compute_output(&tbin, &mut out).is_err());
    }

    #[test]
    fn test_windows_are_isolated() {
        let ctx = abc();
        let manager = BinManager::new(vec![
            Box::new(AggregatorMinMax::new(&ctx, "a", None).unwrap()),
            Box::new(AggregatorMinMax::new(&ctx, "b", None).unwrap()),
        ]);
        let mut sbin = manager.create_spatial_bin(0);
        manager.aggregate_spatial_bin(&obs(&[1.0, 5.0, 0.0]), &mut sbin).unwrap();
        manager.aggregate_spatial_bin(&obs(&[2.0, 4.0, 0.0]), &mut sbin).unwrap();
        manager.complete_spatial_bin(&mut sbin).unwrap();
        assert_eq!(manager.spatial_vector(&sbin, 0).as_slice(), &[1.0, 2.0]);
        assert_eq!(manager.spatial_vector(&sbin, 1).as_slice(), &[4.0, 5.0]);
    }

    #[test]
    fn test_temporal_aggregation_is_commutative() {
        let ctx = abc();
        let configs = [
            AggregatorConfig::new("AVG", "a").with_weight_coeff(0.5).with_output_counts(true),
            AggregatorConfig::new("AVG_ML", "b").with_weight_coeff(1.0),
            AggregatorConfig::new("AVG_OUTLIER", "a").with_deviation_factor(1.5),
            AggregatorConfig::new("MIN_MAX", "c"),
            AggregatorConfig::new("PERCENTILE", "a").with_percentage(75),
            AggregatorConfig::new("SUM", "b"),
            AggregatorConfig::new("MEAN_OBS", "c"),
        ];
        let manager = BinManager::from_config(&ctx, &configs, None).unwrap();
        assert!(manager.has_growable_spatial_data());

        let passes: Vec<SpatialBin> = [
            vec![[0.5, 1.5, 2.0], [0.7, 2.5, f32::NAN]],
            vec![[1.5, 0.25, 3.0]],
            vec![[f32::NAN, f32::NAN, f32::NAN], [0.1, 9.0, -1.0], [0.2, 8.0, -2.0]],
        ]
        .iter()
        .map(|pass| {
            let mut bin = manager.create_spatial_bin(7);
            for values in pass {
                manager.aggregate_spatial_bin(&obs(values), &mut bin).unwrap();
            }
            manager.complete_spatial_bin(&mut bin).unwrap();
            bin
        })
        .collect();

        let merge = |order: &[usize]| -> Vec<f32> {
            let mut tbin = manager.create_temporal_bin(7).unwrap();
            for &i in order {
                manager.aggregate_temporal_bin(&passes[i], &mut tbin).unwrap();
            }
            manager.complete_temporal_bin(&mut tbin).unwrap();
            assert_eq!(tbin.num_obs, 6);
            assert_eq!(tbin.num_passes, 3);
            manager.compute_result(&tbin).unwrap()
        };

        let forward = merge(&[0, 1, 2]);
        for order in [[2, 1, 0], [1, 0, 2], [2, 0, 1]] {
            let other = merge(&order);
            for (a, b) in forward.iter().zip(&other) {
                assert!(
                    (a - b).abs() <= 1e-5 * a.abs().max(1.0),
                    "{:?} vs {:?}",
                    forward,
                    other
                );
            }
        }
    }
}
