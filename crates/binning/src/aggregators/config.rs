//! Named-parameter aggregator configuration.

use serde::{Deserialize, Serialize};

use super::registry::find_descriptor;
use crate::error::{BinningError, Result};

/// Configuration of a single aggregator.
///
/// Only the parameters relevant to `type` are read; the others are ignored.
///
/// ```yaml
/// type: PERCENTILE
/// var_name: chl
/// percentage: 90
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Registered aggregator type, e.g. `AVG`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Source variable (the driver variable for `ON_MAX_SET`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,

    /// Prefix of the output features; defaults to `var_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    /// Variables captured at the maximum (`ON_MAX_SET`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_var_names: Vec<String>,

    /// Percentile in (0, 100] (`PERCENTILE`, default 90).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i32>,

    /// Outlier threshold in sigma (`AVG_OUTLIER`, default 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_factor: Option<f64>,

    /// Exponent of the pass weight `n^c` (`AVG`, `AVG_ML`, default 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_coeff: Option<f64>,

    /// Append a counts feature (`AVG`).
    #[serde(default)]
    pub output_counts: bool,

    /// Emit the weighted sums instead of mean and sigma (`AVG`).
    #[serde(default)]
    pub output_sums: bool,
}

impl AggregatorConfig {
    /// Config of `kind` over `var_name`, all other parameters at default.
    pub fn new(kind: impl Into<String>, var_name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            var_name: Some(var_name.into()),
            ..Default::default()
        }
    }

    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    pub fn with_set_var_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_var_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_percentage(mut self, percentage: i32) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn with_deviation_factor(mut self, factor: f64) -> Self {
        self.deviation_factor = Some(factor);
        self
    }

    pub fn with_weight_coeff(mut self, coeff: f64) -> Self {
        self.weight_coeff = Some(coeff);
        self
    }

    pub fn with_output_counts(mut self, output_counts: bool) -> Self {
        self.output_counts = output_counts;
        self
    }

    pub fn with_output_sums(mut self, output_sums: bool) -> Self {
        self.output_sums = output_sums;
        self
    }

    /// The source variable name, required by every aggregator type.
    pub fn require_var_name(&self) -> Result<&str> {
        match self.var_name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(BinningError::invalid_parameter(
                "var_name",
                format!("must be set for {}", self.kind),
            )),
        }
    }

    /// The target name, `None` when unset or empty.
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref().filter(|t| !t.is_empty())
    }

    /// Check the type and the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if find_descriptor(&self.kind).is_none() {
            return Err(BinningError::UnknownAggregator(self.kind.clone()));
        }
        self.require_var_name()?;
        if let Some(p) = self.percentage {
            if p <= 0 || p > 100 {
                return Err(BinningError::invalid_parameter(
                    "percentage",
                    format!("must be in (0, 100], got {}", p),
                ));
            }
        }
        if let Some(f) = self.deviation_factor {
            if !(f > 0.0) || !f.is_finite() {
                return Err(BinningError::invalid_parameter(
                    "deviation_factor",
                    format!("must be a positive number, got {}", f),
                ));
            }
        }
        if let Some(c) = self.weight_coeff {
            if !(c >= 0.0) {
                return Err(BinningError::invalid_parameter(
                    "weight_coeff",
                    format!("must be >= 0, got {}", c),
                ));
            }
        }
        if self.set_var_names.iter().any(|n| n.is_empty()) {
            return Err(BinningError::invalid_parameter(
                "set_var_names",
                "names must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
type: AVG
var_name: chl
target_name: chl_avg
weight_coeff: 0.5
output_counts: true
"#;
        let config: AggregatorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kind, "AVG");
        assert_eq!(config.require_var_name().unwrap(), "chl");
        assert_eq!(config.target_name(), Some("chl_avg"));
        assert_eq!(config.weight_coeff, Some(0.5));
        assert!(config.output_counts);
        assert!(!config.output_sums);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "type: AVG\nvar_name: chl\nweigth_coeff: 0.5\n";
        assert!(serde_yaml::from_str::<AggregatorConfig>(yaml).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = AggregatorConfig::new("ON_MAX_SET", "chl").with_set_var_names(["tsm", "sst"]);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"ON_MAX_SET\""));
        let parsed: AggregatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            AggregatorConfig::new("MEDIAN", "chl").validate(),
            Err(BinningError::UnknownAggregator(_))
        ));
        assert!(AggregatorConfig::new("PERCENTILE", "chl").with_percentage(0).validate().is_err());
        assert!(AggregatorConfig::new("PERCENTILE", "chl").with_percentage(101).validate().is_err());
        assert!(AggregatorConfig::new("PERCENTILE", "chl").with_percentage(100).validate().is_ok());
        assert!(AggregatorConfig::new("AVG_OUTLIER", "chl")
            .with_deviation_factor(0.0)
            .validate()
            .is_err());
        assert!(AggregatorConfig::new("AVG", "chl").with_weight_coeff(-1.0).validate().is_err());

        let no_var = AggregatorConfig {
            kind: "SUM".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            no_var.validate(),
            Err(BinningError::InvalidParameter { ref param, .. }) if param == "var_name"
        ));
    }
}
