use super::{feature_names, target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::Result;
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// First valid value encountered ("FIRST").
///
/// The temporal result is the first valid pass value in merge order, so it
/// is only reproducible when passes are merged in a fixed order.
#[derive(Debug)]
pub struct AggregatorFirst {
    var_index: usize,
    names: FeatureNames,
}

impl AggregatorFirst {
    pub const NAME: &'static str = "FIRST";

    pub fn new(var_ctx: &VariableContext, var_name: &str, target_name: Option<&str>) -> Result<Self> {
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);
        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &["first"]),
                feature_names(var_name, &["first"]),
                feature_names(target, &["first"]),
            ),
        })
    }
}

impl Aggregator for AggregatorFirst {
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
        spatial.set(0, f32::NAN);
    }

    fn aggregate_spatial(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        spatial: &mut VectorMut<'_>,
    ) {
        if spatial.get(0).is_nan() {
            spatial.set(0, observation.get(self.var_index));
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
        temporal.set(0, f32::NAN);
    }

    fn aggregate_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        if temporal.get(0).is_nan() {
            temporal.set(0, spatial.get(0));
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
        output.set(0, temporal.get(0));
    }
}
