//! Aggregators: pluggable online statistics over bin feature windows.
//!
//! Every aggregator owns three contiguous feature windows, one in the
//! spatial array, one in the temporal array and one in the output array.
//! The [`crate::BinManager`] drives the lifecycle below for every bin and
//! hands each aggregator only its own windows and context slot.
//!
//! ```text
//!   init_spatial ─▶ aggregate_spatial (per observation) ─▶ complete_spatial
//!                                                               │
//!   init_temporal ─▶ aggregate_temporal (per pass) ◀────────────┘
//!                          │
//!                          ▼
//!                  complete_temporal ─▶ compute_output
//! ```
//!
//! Missing or NaN values never fail; they contribute nothing and surface as
//! NaN (or a zero count) in the output.

mod average;
mod average_ml;
mod average_outlier;
pub mod config;
mod first;
mod mean_obs;
mod min_max;
mod on_max_set;
mod percentile;
pub mod registry;
mod sum;

pub use average::AggregatorAverage;
pub use average_ml::AggregatorAverageML;
pub use average_outlier::AggregatorAverageOutlierAware;
pub use config::AggregatorConfig;
pub use first::AggregatorFirst;
pub use mean_obs::AggregatorMeanObs;
pub use min_max::AggregatorMinMax;
pub use on_max_set::AggregatorOnMaxSet;
pub use percentile::{compute_percentile, AggregatorPercentile};
pub use registry::{create_aggregator, find_descriptor, AggregatorDescriptor, DESCRIPTORS};
pub use sum::AggregatorSum;

use std::fmt;

use crate::bin::AggregatorContext;
use crate::observation::Observation;
use crate::vector::{Vector, VectorMut};

/// Lifecycle contract of a binning aggregator.
///
/// Implementations must be deterministic, must only write their own windows,
/// and must tolerate bins without a single valid observation.
pub trait Aggregator: Send + Sync + fmt::Debug {
    /// Stable type identifier, e.g. `"AVG"`.
    fn name(&self) -> &str;

    fn spatial_feature_names(&self) -> &[String];

    fn temporal_feature_names(&self) -> &[String];

    fn output_feature_names(&self) -> &[String];

    /// Whether the spatial phase retains every sample in the bin context.
    fn requires_growable_spatial_data(&self) -> bool {
        false
    }

    fn init_spatial(&self, ctx: &mut AggregatorContext<'_>, spatial: &mut VectorMut<'_>);

    fn aggregate_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        observation: &Observation,
        spatial: &mut VectorMut<'_>,
    );

    /// Finish a pass. `num_spatial_obs` counts every observation routed to
    /// the bin, valid or not.
    fn complete_spatial(
        &self,
        ctx: &mut AggregatorContext<'_>,
        num_spatial_obs: i32,
        spatial: &mut VectorMut<'_>,
    );

    fn init_temporal(&self, ctx: &mut AggregatorContext<'_>, temporal: &mut VectorMut<'_>);

    /// Merge one completed pass into the temporal state.
    fn aggregate_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        spatial: &Vector<'_>,
        num_spatial_obs: i32,
        temporal: &mut VectorMut<'_>,
    );

    fn complete_temporal(
        &self,
        ctx: &mut AggregatorContext<'_>,
        num_passes: i32,
        temporal: &mut VectorMut<'_>,
    );

    fn compute_output(&self, temporal: &Vector<'_>, output: &mut VectorMut<'_>);
}

/// Names and windows shared by every aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeatureNames {
    pub spatial: Vec<String>,
    pub temporal: Vec<String>,
    pub output: Vec<String>,
}

impl FeatureNames {
    pub fn new(spatial: Vec<String>, temporal: Vec<String>, output: Vec<String>) -> Self {
        Self {
            spatial,
            temporal,
            output,
        }
    }
}

/// `prefix_suffix` for each suffix.
pub(crate) fn feature_names(prefix: &str, suffixes: &[&str]) -> Vec<String> {
    suffixes
        .iter()
        .map(|suffix| format!("{}_{}", prefix, suffix))
        .collect()
}

/// Output prefix: the target name when given, otherwise the variable name.
pub(crate) fn target_or<'a>(target_name: Option<&'a str>, var_name: &'a str) -> &'a str {
    match target_name {
        Some(t) if !t.is_empty() => t,
        _ => var_name,
    }
}

/// Pass weight as a function of the number of spatial observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightFn {
    /// `w = 1`
    Unit,
    /// `w = n`
    Linear,
    /// `w = sqrt(n)`
    Sqrt,
    /// `w = n^c`
    Pow(f32),
}

impl WeightFn {
    /// Weight function for `n^coeff`, using the exact forms for 0, 0.5 and 1.
    pub fn from_coeff(coeff: f64) -> Self {
        if coeff == 0.0 {
            Self::Unit
        } else if coeff == 1.0 {
            Self::Linear
        } else if coeff == 0.5 {
            Self::Sqrt
        } else {
            Self::Pow(coeff as f32)
        }
    }

    #[inline]
    pub fn eval(&self, n: i32) -> f32 {
        match self {
            Self::Unit => 1.0,
            Self::Linear => n as f32,
            Self::Sqrt => (n as f32).sqrt(),
            Self::Pow(c) => (n as f32).powf(*c),
        }
    }
}
