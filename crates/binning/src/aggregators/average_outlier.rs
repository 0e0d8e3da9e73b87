use super::{feature_names, target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::{BinningError, Result};
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Default deviation factor in units of sigma.
pub const DEFAULT_DEVIATION_FACTOR: f64 = 1.0;

/// Outlier-robust mean over per-pass means ("AVG_OUTLIER").
///
/// Every pass contributes its mean. At temporal completion the pass means
/// are sorted and all values farther than `deviation_factor * sigma` from the
/// mean are dropped, repeating until the set is stable.
#[derive(Debug)]
pub struct AggregatorAverageOutlierAware {
    var_index: usize,
    names: FeatureNames,
    deviation_factor: f64,
}

impl AggregatorAverageOutlierAware {
    pub const NAME: &'static str = "AVG_OUTLIER";

    pub fn new(
        var_ctx: &VariableContext,
        var_name: &str,
        target_name: Option<&str>,
        deviation_factor: f64,
    ) -> Result<Self> {
        if !(deviation_factor > 0.0) || !deviation_factor.is_finite() {
            return Err(BinningError::invalid_parameter(
                "deviation_factor",
                format!("must be a positive number, got {}", deviation_factor),
            ));
        }
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);
        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &["sum", "counts"]),
                feature_names(var_name, &["mean", "sigma", "counts"]),
                feature_names(target, &["mean", "sigma", "counts"]),
            ),
            deviation_factor,
        })
    }
}

impl Aggregator for AggregatorAverageOutlierAware {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn spatial_feature_names(&self) -> &[String] {
        &self.names.spatial
    }

    fn temporal_feature_names(&self) -> &[String] {
        &self.names.temporal
    }

    fn output_feature_names(&self) -> &[String] {
        &self.names.output
    }

    fn init_spatial(&self, _ctx: &mut AggregatorContext<'_>, spatial: &mut VectorMut<'_>) {
        spatial.fill(0.0);
    }

    fn aggregate_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        spatial: &mut VectorMut<'_>,
    ) {
        let value = observation.get(self.var_index);
        if !value.is_nan() {
            spatial.set(0, spatial.get(0) + value);
            spatial.set(1, spatial.get(1) + 1.0);
        }
    }

    fn complete_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_spatial_obs: i32,
        spatial: &mut VectorMut<'_>,
    ) {
        let counts = spatial.get(1);
        if counts > 0.0 {
            spatial.set(0, spatial.get(0) / counts);
        } else {
            spatial.set(0, f32::NAN);
        }
    }

    fn init_temporal(&self, ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>) {
        temporal.fill(0.0);
        ctx.reset();
    }

    fn aggregate_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
        let mean = spatial.get(0);
        if !mean.is_nan() {
            ctx.samples_mut().add(mean);
        }
    }

    fn complete_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        let samples = ctx.take_samples();
        match filter_outliers(&samples.sorted(), self.deviation_factor) {
            Some((mean, sigma, count)) => {
                temporal.set(0, mean as f32);
                temporal.set(1, sigma as f32);
                temporal.set(2, count as f32);
            }
            None => {
                temporal.set(0, f32::NAN);
                temporal.set(1, f32::NAN);
                temporal.set(2, 0.0);
            }
        }
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        output.set(0, temporal.get(0));
        output.set(1, temporal.get(1));
        output.set(2, temporal.get(2));
    }
}

/// Mean and population sigma of `values`; sigma is 0 for a single value.
fn mean_sigma(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Iteratively drop values with `|x - mean| > factor * sigma`.
///
/// Returns `(mean, sigma, count)` of the retained set, or `None` without input.
fn filter_outliers(sorted: &[f32], factor: f64) -> Option<(f64, f64, usize)> {
    if sorted.is_empty() {
        return None;
    }
    let mut values: Vec<f64> = sorted.iter().map(|&v| v as f64).collect();
    loop {
        let (mean, sigma) = mean_sigma(&values);
        let limit = factor * sigma;
        let kept: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() <= limit)
            .collect();
        if kept.len() == values.len() || kept.is_empty() {
            return Some((mean, sigma, values.len()));
        }
        values = kept;
    }
}
