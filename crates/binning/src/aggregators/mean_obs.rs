use super::{feature_names, target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::Result;
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Unweighted mean over all individual observations ("MEAN_OBS").
///
/// Spatial and temporal features hold the raw sum, sum of squares and
/// count, so every observation has the same weight regardless of its pass.
#[derive(Debug)]
pub struct AggregatorMeanObs {
    var_index: usize,
    names: FeatureNames,
}

impl AggregatorMeanObs {
    pub const NAME: &'static str = "MEAN_OBS";

    pub fn new(var_ctx: &VariableContext, var_name: &str, target_name: Option<&str>) -> Result<Self> {
        let var_index = var_ctx.require_index(var_name)?;
        let names = feature_names(target_or(target_name, var_name), &["mean", "sigma", "counts"]);
        Ok(Self {
            var_index,
            names: FeatureNames::new(names.clone(), names.clone(), names),
        })
    }
}

impl Aggregator for AggregatorMeanObs {
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
            spatial.set(1, spatial.get(1) + value * value);
            spatial.set(2, spatial.get(2) + 1.0);
        }
    }

    fn complete_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_spatial_obs: i32,
        _spatial: &mut VectorMut<'_>,
    ) {
    }

    fn init_temporal(&self, _ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>) {
        temporal.fill(0.0);
    }

    fn aggregate_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        let counts = spatial.get(2);
        if !(counts > 0.0) || spatial.get(0).is_nan() {
            return;
        }
        temporal.set(0, temporal.get(0) + spatial.get(0));
        temporal.set(1, temporal.get(1) + spatial.get(1));
        temporal.set(2, temporal.get(2) + counts);
    }

    fn complete_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        let counts = temporal.get(2);
        if !(counts > 0.0) {
            output.set(0, f32::NAN);
            output.set(1, f32::NAN);
            output.set(2, 0.0);
            return;
        }
        let n = counts as f64;
        let mean = temporal.get(0) as f64 / n;
        let sigma_sqr = temporal.get(1) as f64 / n - mean * mean;
        let sigma = if sigma_sqr > 0.0 { sigma_sqr.sqrt() } else { 0.0 };
        output.set(0, mean as f32);
        output.set(1, sigma as f32);
        output.set(2, counts);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{output, spatial_values, temporal};
    use super::*;

    fn agg(target: Option<&str>) -> AggregatorMeanObs {
        let ctx = VariableContext::new(["Hans"]).unwrap();
        AggregatorMeanObs::new(&ctx, "Hans", target).unwrap()
    }

    #[test]
    fn test_metadata() {
        let agg = agg(None);
        assert_eq!(agg.name(), "MEAN_OBS");
        assert_eq!(agg.spatial_feature_names(), ["Hans_mean", "Hans_sigma", "Hans_counts"]);
        assert_eq!(agg.temporal_feature_names(), ["Hans_mean", "Hans_sigma", "Hans_counts"]);
        assert_eq!(agg.output_feature_names(), ["Hans_mean", "Hans_sigma", "Hans_counts"]);

        let agg = self::agg(Some("Lena"));
        assert_eq!(agg.temporal_feature_names()[0], "Lena_mean");
        assert_eq!(agg.output_feature_names()[0], "Lena_mean");
    }

    #[test]
    fn test_spatial_raw_sums() {
        let (features, _) = spatial_values(&agg(None), &[f32::NAN, 2.0, 3.0]);
        assert_eq!(features, vec![5.0, 13.0, 2.0]);

        let (features, _) = spatial_values(&agg(None), &[0.32]);
        assert_eq!(features, vec![0.32, 0.32 * 0.32, 1.0]);
    }

    #[test]
    fn test_temporal_three_measurements() {
        let agg = agg(None);
        let t = temporal(
            &agg,
            &[(vec![2.0, 4.0, 1.0], 1), (vec![3.0, 5.0, 2.0], 1), (vec![4.0, 6.0, 3.0], 1)],
        );
        assert_eq!(t, vec![9.0, 15.0, 6.0]);
        assert_eq!(output(&agg, &t), vec![1.5, 0.5, 6.0]);
    }

    #[test]
    fn test_temporal_skips_empty_pass() {
        let agg = agg(None);
        let t = temporal(
            &agg,
            &[(vec![2.0, 4.0, 1.0], 1), (vec![3.0, 9.0, 1.0], 1), (vec![f32::NAN, f32::NAN, 0.0], 1)],
        );
        assert_eq!(t, vec![5.0, 13.0, 2.0]);
        assert_eq!(output(&agg, &t), vec![2.5, 0.5, 2.0]);
    }

    #[test]
    fn test_no_data() {
        let agg = agg(None);
        let out = output(&agg, &temporal(&agg, &[]));
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 0.0);

        let out = output(&agg, &[2.0, 4.0, 1.0]);
        assert_eq!(out, vec![2.0, 0.0, 1.0]);
    }
}
