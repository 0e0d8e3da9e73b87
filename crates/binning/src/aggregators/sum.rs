use super::{feature_names, target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::Result;
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Plain sum and count of valid values ("SUM").
#[derive(Debug)]
pub struct AggregatorSum {
    var_index: usize,
    names: FeatureNames,
}

impl AggregatorSum {
    pub const NAME: &'static str = "SUM";

    pub fn new(var_ctx: &VariableContext, var_name: &str, target_name: Option<&str>) -> Result<Self> {
        let var_index = var_ctx.require_index(var_name)?;
        let target = target_or(target_name, var_name);
        Ok(Self {
            var_index,
            names: FeatureNames::new(
                feature_names(var_name, &["sum", "counts"]),
                feature_names(var_name, &["sum", "counts"]),
                feature_names(target, &["sum", "counts"]),
            ),
        })
    }
}

impl Aggregator for AggregatorSum {
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
        temporal.set(0, temporal.get(0) + spatial.get(0));
        temporal.set(1, temporal.get(1) + spatial.get(1));
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
