use super::{feature_names, target_or, Aggregator, FeatureNames, WeightFn};
use crate::bin::AggregatorContext;
use crate::error::{BinningError, Result};
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Smallest value accepted before taking the logarithm.
const LOG_FLOOR: f32 = 1.0e-10;

/// Maximum-likelihood estimate for log-normally distributed values ("AVG_ML").
///
/// Aggregation runs on `ln(x)`. The output converts the mean and variance of
/// the logarithms back into mean, sigma, median and mode of the log-normal
/// distribution.
#[derive(Debug)]
pub struct AggregatorAverageML {
    var_index: usize,
    names: FeatureNames,
    weight_fn: WeightFn,
}

impl AggregatorAverageML {
    pub const NAME: &'static str = "AVG_ML";

    pub fn new(
        var_ctx: &VariableContext,
        var_name: &str,
        target_name: Option<&str>,
        weight_coeff: f64,
    ) -> Result<Self> {
        if !(weight_coeff >= 0.0) {
            return Err(BinningError::invalid_parameter(
                "weight_coeff",
                format!("must be >= 0, got {}", weight_coeff),
            ));
        }
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);
        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &["sum_x", "sum_xx"]),
                feature_names(var_name, &["sum_x", "sum_xx", "sum_w"]),
                feature_names(target, &["mean", "sigma", "median", "mode"]),
            ),
            weight_fn: WeightFn::from_coeff(weight_coeff),
        })
    }
}

impl Aggregator for AggregatorAverageML {
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

    fn init_spatial(&self, ctx: &mut AggregatorContext<'_>, spatial: &mut VectorMut<'_>) {
        spatial.fill(0.0);
        ctx.reset();
    }

    fn aggregate_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        spatial: &mut VectorMut<'_>,
    ) {
        let value = observation.get(self.var_index);
        if value.is_nan() {
            return;
        }
        let log_value = value.max(LOG_FLOOR).ln();
        spatial.set(0, spatial.get(0) + log_value);
        spatial.set(1, spatial.get(1) + log_value * log_value);
        ctx.increment_counter();
    }

    fn complete_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        _num_spatial_obs: i32,
        spatial: &mut VectorMut<'_>,
    ) {
        let count = ctx.counter();
        if count > 0 {
            let count = count as f32;
            spatial.set(0, spatial.get(0) / count);
            spatial.set(1, spatial.get(1) / count);
        } else {
            spatial.fill(f32::NAN);
        }
    }

    fn init_temporal(&self, _ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        if spatial.get(0).is_nan() {
            return;
        }
        let w = self.weight_fn.eval(num_spatial_obs);
        temporal.set(0, temporal.get(0) + spatial.get(0) * w);
        temporal.set(1, temporal.get(1) + spatial.get(1) * w);
        temporal.set(2, temporal.get(2) + w);
    }

    fn complete_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        let sum_x = temporal.get(0) as f64;
        let sum_xx = temporal.get(1) as f64;
        let sum_w = temporal.get(2) as f64;
        if !(sum_w > 0.0) {
            output.fill(f32::NAN);
            return;
        }
        let mu = sum_x / sum_w;
        let sigma_sqr = (sum_xx / sum_w - mu * mu).max(0.0);

        let mean = (mu + 0.5 * sigma_sqr).exp();
        let sigma = mean * (sigma_sqr.exp() - 1.0).sqrt();
        let median = mu.exp();
        let mode = (mu - sigma_sqr).exp();

        output.set(0, mean as f32);
        output.set(1, sigma as f32);
        output.set(2, median as f32);
        output.set(3, mode as f32);
    }
}
