//! Table of aggregator types, keyed by their stable name.

use super::average_outlier::DEFAULT_DEVIATION_FACTOR;
use super::percentile::DEFAULT_PERCENTAGE;
use super::{
    feature_names, target_or, Aggregator, AggregatorAverage, AggregatorAverageML,
    AggregatorAverageOutlierAware, AggregatorConfig, AggregatorFirst, AggregatorMeanObs,
    AggregatorMinMax, AggregatorOnMaxSet, AggregatorPercentile, AggregatorSum,
};
use crate::error::{BinningError, Result};
use crate::observation::VariableContext;

/// Constructor and naming functions of one aggregator type.
pub struct AggregatorDescriptor {
    pub name: &'static str,
    pub create: fn(&VariableContext, &AggregatorConfig) -> Result<Box<dyn Aggregator>>,
    /// Variables the aggregator reads.
    pub source_var_names: fn(&AggregatorConfig) -> Vec<String>,
    /// Output features the aggregator produces.
    pub target_var_names: fn(&AggregatorConfig) -> Vec<String>,
}

impl std::fmt::Debug for AggregatorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// All known aggregator types.
pub static DESCRIPTORS: &[AggregatorDescriptor] = &[
    AggregatorDescriptor {
        name: AggregatorAverage::NAME,
        create: create_average,
        source_var_names: var_name_only,
        target_var_names: average_targets,
    },
    AggregatorDescriptor {
        name: AggregatorAverageML::NAME,
        create: create_average_ml,
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["mean", "sigma", "median", "mode"]),
    },
    AggregatorDescriptor {
        name: AggregatorAverageOutlierAware::NAME,
        create: create_average_outlier,
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["mean", "sigma", "counts"]),
    },
    AggregatorDescriptor {
        name: AggregatorMinMax::NAME,
        create: |ctx, c| {
            Ok(Box::new(AggregatorMinMax::new(ctx, c.require_var_name()?, c.target_name())?))
        },
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["min", "max"]),
    },
    AggregatorDescriptor {
        name: AggregatorPercentile::NAME,
        create: create_percentile,
        source_var_names: var_name_only,
        target_var_names: percentile_targets,
    },
    AggregatorDescriptor {
        name: AggregatorOnMaxSet::NAME,
        create: |ctx, c| {
            Ok(Box::new(AggregatorOnMaxSet::new(
                ctx,
                c.require_var_name()?,
                c.target_name(),
                &c.set_var_names,
            )?))
        },
        source_var_names: on_max_set_sources,
        target_var_names: on_max_set_targets,
    },
    AggregatorDescriptor {
        name: AggregatorSum::NAME,
        create: |ctx, c| {
            Ok(Box::new(AggregatorSum::new(ctx, c.require_var_name()?, c.target_name())?))
        },
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["sum", "counts"]),
    },
    AggregatorDescriptor {
        name: AggregatorMeanObs::NAME,
        create: |ctx, c| {
            Ok(Box::new(AggregatorMeanObs::new(ctx, c.require_var_name()?, c.target_name())?))
        },
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["mean", "sigma", "counts"]),
    },
    AggregatorDescriptor {
        name: AggregatorFirst::NAME,
        create: |ctx, c| {
            Ok(Box::new(AggregatorFirst::new(ctx, c.require_var_name()?, c.target_name())?))
        },
        source_var_names: var_name_only,
        target_var_names: |c| prefixed(c, &["first"]),
    },
];

/// Descriptor registered under `name` (case-insensitive).
pub fn find_descriptor(name: &str) -> Option<&'static AggregatorDescriptor> {
    DESCRIPTORS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Validate `config` and build the aggregator it describes.
pub fn create_aggregator(
    var_ctx: &VariableContext,
    config: &AggregatorConfig,
) -> Result<Box<dyn Aggregator>> {
    config.validate()?;
    let descriptor = find_descriptor(&config.kind)
        .ok_or_else(|| BinningError::UnknownAggregator(config.kind.clone()))?;
    (descriptor.create)(var_ctx, config)
}

fn create_average(ctx: &VariableContext, c: &AggregatorConfig) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(AggregatorAverage::new(
        ctx,
        c.require_var_name()?,
        c.target_name(),
        c.weight_coeff.unwrap_or(0.0),
        c.output_counts,
        c.output_sums,
    )?))
}

fn create_average_ml(ctx: &VariableContext, c: &AggregatorConfig) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(AggregatorAverageML::new(
        ctx,
        c.require_var_name()?,
        c.target_name(),
        c.weight_coeff.unwrap_or(0.0),
    )?))
}

fn create_average_outlier(
    ctx: &VariableContext,
    c: &AggregatorConfig,
) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(AggregatorAverageOutlierAware::new(
        ctx,
        c.require_var_name()?,
        c.target_name(),
        c.deviation_factor.unwrap_or(DEFAULT_DEVIATION_FACTOR),
    )?))
}

fn create_percentile(ctx: &VariableContext, c: &AggregatorConfig) -> Result<Box<dyn Aggregator>> {
    Ok(Box::new(AggregatorPercentile::new(
        ctx,
        c.require_var_name()?,
        c.target_name(),
        c.percentage.unwrap_or(DEFAULT_PERCENTAGE),
    )?))
}

fn var_name_only(c: &AggregatorConfig) -> Vec<String> {
    c.var_name.iter().cloned().collect()
}

fn output_prefix(c: &AggregatorConfig) -> String {
    target_or(c.target_name(), c.var_name.as_deref().unwrap_or_default()).to_string()
}

fn prefixed(c: &AggregatorConfig, suffixes: &[&str]) -> Vec<String> {
    feature_names(&output_prefix(c), suffixes)
}

fn average_targets(c: &AggregatorConfig) -> Vec<String> {
    let mut suffixes = if c.output_sums {
        vec!["sum", "sum_sq", "weights"]
    } else {
        vec!["mean", "sigma"]
    };
    if c.output_counts {
        suffixes.push("counts");
    }
    prefixed(c, &suffixes)
}

fn percentile_targets(c: &AggregatorConfig) -> Vec<String> {
    match c.target_name() {
        Some(t) => vec![t.to_string()],
        None => vec![format!(
            "{}_p{}",
            c.var_name.as_deref().unwrap_or_default(),
            c.percentage.unwrap_or(DEFAULT_PERCENTAGE)
        )],
    }
}

fn on_max_set_sources(c: &AggregatorConfig) -> Vec<String> {
    let mut names = var_name_only(c);
    names.extend(c.set_var_names.iter().cloned());
    names
}

fn on_max_set_targets(c: &AggregatorConfig) -> Vec<String> {
    let mut names = prefixed(c, &["max", "mjd"]);
    names.extend(c.set_var_names.iter().cloned());
    names
}
