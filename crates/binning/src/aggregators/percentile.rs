use super::{Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::{BinningError, Result};
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Default percentile.
pub const DEFAULT_PERCENTAGE: i32 = 90;

/// P-th percentile of the observed values ("PERCENTILE").
///
/// The spatial phase keeps every valid sample of the pass and reduces them to
/// the pass percentile. The temporal result is the percentile of those pass
/// percentiles, which approximates the percentile over all raw samples
/// without retaining them across passes.
#[derive(Debug)]
pub struct AggregatorPercentile {
    var_index: usize,
    names: FeatureNames,
    percentage: i32,
}

impl AggregatorPercentile {
    pub const NAME: &'static str = "PERCENTILE";

    pub fn new(
        var_ctx: &VariableContext,
        var_name: &str,
        target_name: Option<&str>,
        percentage: i32,
    ) -> Result<Self> {
        if percentage <= 0 || percentage > 100 {
            return Err(BinningError::invalid_parameter(
                "percentage",
                format!("must be in (0, 100], got {}", percentage),
            ));
        }
        let var_index = var_ctx.require_index(var_name)?;
        let suffix = format!("p{}", percentage);
        let source = format!("{}_{}", var_name, suffix);
        let target = match target_name {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => source.clone(),
        };
        Ok(Self {
            var_index,
            names: FeatureNames::new(vec![source.clone()], vec![source], vec![target]),
            percentage,
        })
    }

    pub fn percentage(&self) -> i32 {
        self.percentage
    }
}

impl Aggregator for AggregatorPercentile {
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

    fn requires_growable_spatial_data(&self) -> bool {
        true
    }

    fn init_spatial(&self, ctx: &mut AggregatorContext<'_>, spatial: &mut VectorMut<'_>) {
        spatial.fill(f32::NAN);
        ctx.reset();
    }

    fn aggregate_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        _spatial: &mut VectorMut<'_>,
    ) {
        let value = observation.get(self.var_index);
        if !value.is_nan() {
            ctx.samples_mut().add(value);
        }
    }

    fn complete_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        _num_spatial_obs: i32,
        spatial: &mut VectorMut<'_>,
    ) {
        let samples = ctx.take_samples();
        spatial.set(0, compute_percentile(self.percentage, &samples.sorted()));
    }

    fn init_temporal(&self, ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>) {
        temporal.fill(f32::NAN);
        ctx.reset();
    }

    fn aggregate_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        _temporal: &mut VectorMut<'_>,
    ) {
        let value = spatial.get(0);
        if !value.is_nan() {
            ctx.samples_mut().add(value);
        }
    }

    fn complete_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        _num_passes: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        let samples = ctx.take_samples();
        temporal.set(0, compute_percentile(self.percentage, &samples.sorted()));
    }

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>) {
        output.set(0, temporal.get(0));
    }
}

/// Linearly interpolated `p`-th percentile of ascending `sorted` values.
///
/// With `n = p/100 * (N-1) + 1`, `k = floor(n)` and `d = n - k` the result is
/// `m[k-1] + d * (m[k] - m[k-1])`, clamped to the first and last value.
/// Returns NaN for an empty slice.
pub fn compute_percentile(p: i32, sorted: &[f32]) -> f32 {
    let len = sorted.len();
    if len == 0 {
        return f32::NAN;
    }
    let n = p as f64 / 100.0 * (len - 1) as f64 + 1.0;
    let k = n.floor() as usize;
    let d = n - k as f64;
    if k == 0 {
        sorted[0]
    } else if k >= len {
        sorted[len - 1]
    } else {
        let lower = sorted[k - 1] as f64;
        let upper = sorted[k] as f64;
        (lower + d * (upper - lower)) as f32
    }
}
