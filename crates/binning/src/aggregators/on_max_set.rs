use super::{target_or, Aggregator, FeatureNames};
use crate::bin::AggregatorContext;
use crate::error::Result;
use crate::observation::{Observation, VariableContext};
use crate::vector::{Vector, VectorMut};

/// Keeps a set of variables at the sample where a driver variable is maximal
/// ("ON_MAX_SET").
///
/// Features are `<var>_max`, `<var>_mjd` followed by the set variables. Ties
/// keep the sample seen first, so the result of equal maxima depends on the
/// merge order.
#[derive(Debug)]
pub struct AggregatorOnMaxSet {
    on_max_index: usize,
    set_indexes: Vec<usize>,
    names: FeatureNames,
}

impl AggregatorOnMaxSet {
    pub const NAME: &'static str = "ON_MAX_SET";

    pub fn new<S: AsRef<str>>(
        var_ctx: &VariableContext,
        on_max_var_name: &str,
        target_name: Option<&str>,
        set_var_names: &[S],
    ) -> Result<Self> {
        let on_max_index = var_ctx.require_index(on_max_var_name)?;
        let set_indexes = set_var_names
            .iter()
            .map(|name| var_ctx.require_index(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let target = target_or(target_name, on_max_var_name);

        let with_prefix = |prefix: &str| -> Vec<String> {
            let mut names = vec![format!("{}_max", prefix), format!("{}_mjd", prefix)];
            names.extend(set_var_names.iter().map(|n| n.as_ref().to_string()));
            names
        };

        Ok(Self {
            on_max_index,
            set_indexes,
            names: FeatureNames::new(
                with_prefix(on_max_var_name),
                with_prefix(on_max_var_name),
                with_prefix(target),
            ),
        })
    }
}

impl Aggregator for AggregatorOnMaxSet {
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
        let value = observation.get(self.on_max_index);
        if value.is_nan() {
            return;
        }
        let current = spatial.get(0);
        if current.is_nan() || value > current {
            spatial.set(0, value);
            spatial.set(1, observation.mjd as f32);
            for (i, &index) in self.set_indexes.iter().enumerate() {
                spatial.set(i + 2, observation.get(index));
            }
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
        temporal.fill(f32::NAN);
    }

    fn aggregate_temporal(
        &self,
        _ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        _num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    ) {
        let value = spatial.get(0);
        if value.is_nan() {
            return;
        }
        let current = temporal.get(0);
        if current.is_nan() || value > current {
            for i in 0..temporal.size() {
                temporal.set(i, spatial.get(i));
            }
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
        for i in 0..output.size() {
            output.set(i, temporal.get(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{obs, output, spatial_pass, temporal};
    use super::*;

    fn agg() -> AggregatorOnMaxSet {
        let ctx = VariableContext::new(["a", "b", "c"]).unwrap();
        AggregatorOnMaxSet::new(&ctx, "c", Some("out"), &["a", "b"]).unwrap()
    }

    #[test]
    fn test_metadata() {
        let agg = agg();
        assert_eq!(agg.name(), "ON_MAX_SET");
        assert_eq!(agg.spatial_feature_names(), ["c_max", "c_mjd", "a", "b"]);
        assert_eq!(agg.temporal_feature_names(), ["c_max", "c_mjd", "a", "b"]);
        assert_eq!(agg.output_feature_names(), ["out_max", "out_mjd", "a", "b"]);
    }

    #[test]
    fn test_unknown_set_variable() {
        let ctx = VariableContext::new(["a", "c"]).unwrap();
        assert!(AggregatorOnMaxSet::new(&ctx, "c", None, &["a", "b"]).is_err());
    }

    #[test]
    fn test_values_at_maximum() {
        let agg = agg();
        let pass1 = spatial_pass(
            &agg,
            &[
                Observation::new(0.0, 0.0, 10.0, vec![1.0, 2.0, 0.5]),
                Observation::new(0.0, 0.0, 11.0, vec![3.0, 4.0, 0.9]),
                Observation::new(0.0, 0.0, 12.0, vec![5.0, 6.0, f32::NAN]),
            ],
        );
        assert_eq!(pass1.0, vec![0.9, 11.0, 3.0, 4.0]);

        let pass2 = spatial_pass(
            &agg,
            &[Observation::new(0.0, 0.0, 20.0, vec![7.0, 8.0, 0.7])],
        );
        let out = output(&agg, &temporal(&agg, &[pass2.clone(), pass1.clone()]));
        assert_eq!(out, vec![0.9, 11.0, 3.0, 4.0]);
        let out = output(&agg, &temporal(&agg, &[pass1, pass2]));
        assert_eq!(out, vec![0.9, 11.0, 3.0, 4.0]);
    }

    #[test]
    fn test_tie_keeps_first() {
        let agg = agg();
        let (features, _) = spatial_pass(&agg, &[obs(&[1.0, 1.0, 0.8]), obs(&[2.0, 2.0, 0.8])]);
        assert_eq!(&features[2..], &[1.0, 1.0]);
    }

    #[test]
    fn test_temporal_tie_keeps_first_pass() {
        let agg = agg();
        let first = spatial_pass(&agg, &[Observation::new(0.0, 0.0, 10.0, vec![1.0, 2.0, 0.8])]);
        let second = spatial_pass(&agg, &[Observation::new(0.0, 0.0, 20.0, vec![3.0, 4.0, 0.8])]);

        let out = output(&agg, &temporal(&agg, &[first.clone(), second.clone()]));
        assert_eq!(out, vec![0.8, 10.0, 1.0, 2.0]);
        let out = output(&agg, &temporal(&agg, &[second, first]));
        assert_eq!(out, vec![0.8, 20.0, 3.0, 4.0]);
    }

    #[test]
    fn test_no_data() {
        let agg = agg();
        let pass = spatial_pass(&agg, &[obs(&[1.0, 1.0, f32::NAN])]);
        let out = output(&agg, &temporal(&agg, &[pass]));
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
