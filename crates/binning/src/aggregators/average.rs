use super::{feature_names, target_or, Aggregator, FeatureNames, WeightFn};
use crate::bin::AggregatorContext;
use crate::error::{BinningError, Result};
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Weighted arithmetic mean and standard deviation ("AVG").
///
/// A pass contributes its mean and mean square, weighted by
/// `numSpatialObs^weight_coeff`. With `output_sums` the weighted sums are
/// emitted unchanged instead of mean and sigma, so that results can be
/// merged further downstream.
#[derive(Debug)]
pub struct AggregatorAverage {
    var_index: usize,
    names: FeatureNames,
    weight_fn: WeightFn,
    output_counts: bool,
    output_sums: bool,
}

impl AggregatorAverage {
    pub const NAME: &'static str = "AVG";

    pub fn new(
        var_ctx: &VariableContext,
        var_name: &str,
        target_name: Option<&str>,
        weight_coeff: f64,
        output_counts: bool,
        output_sums: bool,
    ) -> Result<Self> {
        if !(weight_coeff >= 0.0) {
            return Err(BinningError::invalid_parameter(
                "weight_coeff",
                format!("must be >= 0, got {}", weight_coeff),
            ));
        }
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);

        let mut spatial = vec!["sum", "sum_sq"];
        let mut temporal = vec!["sum", "sum_sq", "weights"];
        let mut output = if output_sums {
            vec!["sum", "sum_sq", "weights"]
        } else {
            vec!["mean", "sigma"]
        };
        if output_counts {
            spatial.push("counts");
            temporal.push("counts");
            output.push("counts");
        }

        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &spatial),
                feature_names(var_name, &temporal),
                feature_names(target, &output),
            ),
            weight_fn: WeightFn::from_coeff(weight_coeff),
            output_counts,
            output_sums,
        })
    }
}

impl Aggregator for AggregatorAverage {
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
        spatial.set(0, spatial.get(0) + value);
        spatial.set(1, spatial.get(1) + value * value);
        if self.output_counts {
            spatial.set(2, spatial.get(2) + 1.0);
        }
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
            spatial.set(0, f32::NAN);
            spatial.set(1, f32::NAN);
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
        let mean = spatial.get(0);
        if mean.is_nan() {
            return;
        }
        let w = self.weight_fn.eval(num_spatial_obs);
        temporal.set(0, temporal.get(0) + mean * w);
        temporal.set(1, temporal.get(1) + spatial.get(1) * w);
        temporal.set(2, temporal.get(2) + w);
        if self.output_counts {
            temporal.set(3, temporal.get(3) + spatial.get(2));
        }
    }

    fn complete_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        if self.output_sums {
            for i in 0..output.size() {
                output.set(i, temporal.get(i));
            }
            return;
        }

        let sum_x = temporal.get(0) as f64;
        let sum_xx = temporal.get(1) as f64;
        let sum_w = temporal.get(2) as f64;
        if sum_w > 0.0 {
            let mean = sum_x / sum_w;
            let sigma_sqr = sum_xx / sum_w - mean * mean;
            let sigma = if sigma_sqr > 0.0 { sigma_sqr.sqrt() } else { 0.0 };
            output.set(0, mean as f32);
            output.set(1, sigma as f32);
        } else {
            output.set(0, f32::NAN);
            output.set(1, f32::NAN);
        }
        if self.output_counts {
            output.set(2, temporal.get(3));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{output, run, spatial_values, temporal};
    use super::*;

    fn ctx() -> VariableContext {
        VariableContext::new(["c"]).unwrap()
    }

    #[test]
    fn test_metadata() {
        let agg = AggregatorAverage::new(&ctx(), "c", Some("out"), 0.0, true, false).unwrap();
        assert_eq!(agg.name(), "AVG");
        assert_eq!(agg.spatial_feature_names(), ["c_sum", "c_sum_sq", "c_counts"]);
        assert_eq!(
            agg.temporal_feature_names(),
            ["c_sum", "c_sum_sq", "c_weights", "c_counts"]
        );
        assert_eq!(agg.output_feature_names(), ["out_mean", "out_sigma", "out_counts"]);
        assert!(!agg.requires_growable_spatial_data());

        let agg = AggregatorAverage::new(&ctx(), "c", None, 0.0, false, true).unwrap();
        assert_eq!(agg.output_feature_names(), ["c_sum", "c_sum_sq", "c_weights"]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(AggregatorAverage::new(&ctx(), "c", None, -0.5, false, false).is_err());
        assert!(matches!(
            AggregatorAverage::new(&ctx(), "nope", None, 0.0, false, false),
            Err(BinningError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_spatial_mean_ignores_nan() {
        let agg = AggregatorAverage::new(&ctx(), "c", None, 0.0, true, false).unwrap();
        let (features, n) = spatial_values(&agg, &[1.5, f32::NAN, 2.5, 0.5]);
        assert_eq!(n, 4);
        assert_eq!(features[0], 1.5);
        assert!((features[1] - (2.25 + 6.25 + 0.25) / 3.0).abs() < 1e-6);
        assert_eq!(features[2], 3.0);
    }

    #[test]
    fn test_weighting() {
        let passes: [&[f32]; 2] = [&[1.0, 3.0], &[4.0]];

        let out = run(&AggregatorAverage::new(&ctx(), "c", None, 1.0, false, false).unwrap(), &passes);
        assert!((out[0] - 8.0 / 3.0).abs() < 1e-6);
        assert!((out[1] - 1.247219).abs() < 1e-5);

        let out = run(&AggregatorAverage::new(&ctx(), "c", None, 0.0, false, false).unwrap(), &passes);
        assert!((out[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_nan_pass_contributes_nothing() {
        let agg = AggregatorAverage::new(&ctx(), "c", None, 1.0, true, false).unwrap();
        let out = run(&agg, &[&[f32::NAN, f32::NAN], &[2.0, 4.0]]);
        assert_eq!(out[0], 3.0);
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 2.0);
    }

    #[test]
    fn test_no_data_yields_nan() {
        let agg = AggregatorAverage::new(&ctx(), "c", None, 0.5, true, false).unwrap();
        let out = run(&agg, &[&[f32::NAN]]);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 0.0);

        let out = output(&agg, &temporal(&agg, &[]));
        assert!(out[0].is_nan());
    }

    #[test]
    fn test_output_sums_pass_through() {
        let agg = AggregatorAverage::new(&ctx(), "c", None, 1.0, false, true).unwrap();
        let out = run(&agg, &[&[1.0, 3.0]]);
        assert_eq!(out, vec![4.0, 10.0, 2.0]);
    }
}
