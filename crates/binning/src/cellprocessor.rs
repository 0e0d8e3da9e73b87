//! Post-processing of the output feature vector of a cell.

use serde::{Deserialize, Serialize};

use crate::error::{BinningError, Result};
use crate::vector::{Vector, VectorMut};

/// Configuration of the optional post-processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellProcessorConfig {
    /// Keep, reorder and rename output features.
    ///
    /// Each entry is either an output feature name or `new_name=old_name`.
    Selection { var_names: Vec<String> },
}

impl CellProcessorConfig {
    pub fn selection<I, S>(var_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Selection {
            var_names: var_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the processor for cells whose output features are `input_names`.
    pub fn create(&self, input_names: &[String]) -> Result<Box<dyn CellProcessor>> {
        match self {
            Self::Selection { var_names } => Ok(Box::new(Selection::new(input_names, var_names.as_slice())?)),
        }
    }
}

/// Maps a cell's output vector to the final result vector.
pub trait CellProcessor: Send + Sync + std::fmt::Debug {
    fn output_feature_names(&self) -> &[String];

    fn compute(&self, input: &Vector<'_>, output: &mut VectorMut<'_>);
}

/// Feature selection with optional renaming.
#[derive(Debug, Clone)]
pub struct Selection {
    names: Vec<String>,
    indexes: Vec<usize>,
}

impl Selection {
    pub fn new<S: AsRef<str>>(input_names: &[String], var_names: &[S]) -> Result<Self> {
        if var_names.is_empty() {
            return Err(BinningError::config("selection must name at least one feature"));
        }
        let mut names = Vec::with_capacity(var_names.len());
        let mut indexes = Vec::with_capacity(var_names.len());
        for entry in var_names {
            let entry = entry.as_ref();
            let (new_name, old_name) = match entry.split_once('=') {
                Some((new_name, old_name)) => (new_name.trim(), old_name.trim()),
                None => (entry.trim(), entry.trim()),
            };
            if new_name.is_empty() || old_name.is_empty() {
                return Err(BinningError::config(format!(
                    "malformed selection entry '{}'",
                    entry
                )));
            }
            let index = input_names
                .iter()
                .position(|n| n == old_name)
                .ok_or_else(|| BinningError::UnknownVariable(old_name.to_string()))?;
            if names.iter().any(|n| n == new_name) {
                return Err(BinningError::config(format!(
                    "duplicate selected feature name '{}'",
                    new_name
                )));
            }
            names.push(new_name.to_string());
            indexes.push(index);
        }
        Ok(Self { names, indexes })
    }
}

impl CellProcessor for Selection {
    fn output_feature_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, input: &Vector<'_>, output: &mut VectorMut<'_>) {
        for (i, &index) in self.indexes.iter().enumerate() {
            output.set(i, input.get(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_names() -> Vec<String> {
        ["out_min", "out_max", "chl_mean", "chl_sigma"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_select_and_rename() {
        let sel = Selection::new(&input_names(), &["chl_mean", "chl_max = out_max"]).unwrap();
        assert_eq!(sel.output_feature_names(), ["chl_mean", "chl_max"]);

        let input = [0.1, 0.9, 0.5, 0.2];
        let mut out = [0.0; 2];
        sel.compute(&Vector::new(&input), &mut VectorMut::new(&mut out));
        assert_eq!(out, [0.5, 0.9]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Selection::new(&input_names(), &["tsm_mean"]),
            Err(BinningError::UnknownVariable(_))
        ));
        assert!(Selection::new(&input_names(), &["x=out_min", "x=out_max"]).is_err());
        assert!(Selection::new(&input_names(), &["=out_min"]).is_err());
        assert!(Selection::new::<&str>(&input_names(), &[]).is_err());
    }

    #[test]
    fn test_config_yaml() {
        let yaml = "type: selection\nvar_names: [out_min, 'm=chl_mean']\n";
        let config: CellProcessorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config, CellProcessorConfig::selection(["out_min", "m=chl_mean"]));
        let processor = config.create(&input_names()).unwrap();
        assert_eq!(processor.output_feature_names(), ["out_min", "m"]);
    }
}
