//! Observations and the variable context that names their values.

use serde::{Deserialize, Serialize};

use crate::error::{BinningError, Result};

/// A single pixel observation.
///
/// `mjd` is the observation time in days since 2000-01-01T00:00:00Z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub mjd: f64,
    pub values: Vec<f32>,
}

impl Observation {
    /// Create a new observation.
    pub fn new(lat: f64, lon: f64, mjd: f64, values: Vec<f32>) -> Self {
        Self {
            lat,
            lon,
            mjd,
            values,
        }
    }

    /// Value of the variable at `index`, NaN if the feed did not supply it.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(f32::NAN)
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Whether the geographic position can be mapped onto a grid.
    pub fn has_valid_position(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Ordered list of the variable names carried by every observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableContext {
    names: Vec<String>,
}

impl VariableContext {
    /// Create a context from variable names; names must be unique.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(BinningError::config("variable names must not be empty"));
            }
            if names[..i].contains(name) {
                return Err(BinningError::config(format!(
                    "duplicate variable name '{}'",
                    name
                )));
            }
        }
        Ok(Self { names })
    }

    pub fn variable_count(&self) -> usize {
        self.names.len()
    }

    pub fn variable_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index of `name`, if known.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Index of `name`, or an [`BinningError::UnknownVariable`] error.
    pub fn require_index(&self, name: &str) -> Result<usize> {
        self.variable_index(name)
            .ok_or_else(|| BinningError::UnknownVariable(name.to_string()))
    }
}
