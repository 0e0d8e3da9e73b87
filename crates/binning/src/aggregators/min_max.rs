use super::{feature_names, target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::Result;
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Running minimum and maximum ("MIN_MAX").
#[derive(Debug)]
pub struct AggregatorMinMax {
    var_index: usize,
    names: FeatureNames,
}

impl AggregatorMinMax {
    pub const NAME: &'static str = "MIN_MAX";

    pub fn new(var_ctx: &VariableContext, var_name: &str, target_name: Option<&str>) -> Result<Self> {
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);
        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &["min", "max"]),
                feature_names(var_name, &["min", "max"]),
                feature_names(target, &["min", "max"]),
            ),
        })
    }
}

/// Fold a (min, max) candidate into the pair stored at indices 0 and 1.
#[inline]
fn update(vector: &mut VectorMut<'_>, min: f32, max: f32) {
    if !min.is_nan() {
        let current = vector.get(0);
        if current.is_nan() || min < current {
            vector.set(0, min);
        }
    }
    if !max.is_nan() {
        let current = vector.get(1);
        if current.is_nan() || max > current {
            vector.set(1, max);
        }
    }
}

impl Aggregator for AggregatorMinMax {
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
        spatial.fill(f32::NAN);
    }

    fn aggregate_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        spatial: &mut VectorMut<'_>,
    ) {
        let value = observation.get(self.var_index);
        update(spatial, value, value);
    }

    fn complete_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_spatial_obs: i32,
        _spatial: &mut VectorMut<'_>,
    ) {
    }

    fn init_temporal(&self, _ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>) {
        temporal.fill(f32::NAN);
    }

    fn aggregate_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        update(temporal, spatial.get(0), spatial.get(1));
    }

    fn complete_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        output.set(0, temporal.get(0));
        output.set(1, temporal.get(1));
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::run;
    use super::*;

    fn agg() -> AggregatorMinMax {
        let ctx = VariableContext::new(["a"]).unwrap();
        AggregatorMinMax::new(&ctx, "a", Some("out")).unwrap()
    }

    #[test]
    fn test_metadata() {
        let agg = agg();
        assert_eq!(agg.name(), "MIN_MAX");
        assert_eq!(agg.spatial_feature_names(), ["a_min", "a_max"]);
        assert_eq!(agg.temporal_feature_names(), ["a_min", "a_max"]);
        assert_eq!(agg.output_feature_names(), ["out_min", "out_max"]);
    }

    #[test]
    fn test_min_max_across_passes() {
        let out = run(&agg(), &[&[0.9, 0.2, f32::NAN], &[0.5, 1.1], &[f32::NAN]]);
        assert_eq!(out, vec![0.2, 1.1]);
    }

    #[test]
    fn test_no_valid_observation_yields_nan() {
        let out = run(&agg(), &[&[f32::NAN, f32::NAN]]);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        let out = run(&agg(), &[]);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_negative_values() {
        let out = run(&agg(), &[&[-3.0, -1.0], &[-7.5]]);
        assert_eq!(out, vec![-7.5, -1.0]);
    }
}
