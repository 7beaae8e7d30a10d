//! The `hptuning` section of group specifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// How one hyperparameter's candidate values are declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixConfig {
    /// Explicit values
    Values(Vec<Value>),
    /// `[start, stop, step]`, stop excluded
    Range(f64, f64, f64),
    /// `[start, stop, num]`, both ends included
    Linspace(f64, f64, u32),
    /// Like `linspace`, on the exponents of 10
    Logspace(f64, f64, u32),
}

/// Most candidate values one hyperparameter may declare.
pub const MAX_MATRIX_VALUES: usize = 10_000;

/// Most suggestions a grid search may enumerate.
pub const MAX_GRID_SUGGESTIONS: usize = 100_000;

impl MatrixConfig {
    /// Number of candidate values, computed without generating them.
    pub fn len(&self) -> usize {
        match self {
            MatrixConfig::Values(values) => values.len(),
            MatrixConfig::Range(start, stop, step) => {
                if *step <= 0.0 {
                    return 0;
                }
                // Float-to-int casts saturate; NaN becomes 0.
                ((stop - start) / step).ceil().max(0.0) as usize
            }
            MatrixConfig::Linspace(_, _, num) | MatrixConfig::Logspace(_, _, num) => *num as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The candidate at `index`, if there is one.
    pub fn value_at(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        match self {
            MatrixConfig::Values(values) => values.get(index).cloned(),
            MatrixConfig::Range(start, _, step) => Some(number(start + step * index as f64)),
            MatrixConfig::Linspace(start, stop, num) => {
                Some(number(linspace_at(*start, *stop, *num, index)))
            }
            MatrixConfig::Logspace(start, stop, num) => Some(number(power_of_ten(linspace_at(
                *start, *stop, *num, index,
            )))),
        }
    }

    /// Candidate values in declared order.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.value_at(i)).collect()
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        match self {
            MatrixConfig::Range(start, stop, step)
                if !(start.is_finite() && stop.is_finite() && step.is_finite()) =>
            {
                return Err(format!("matrix `{}` range bounds must be finite", name));
            }
            MatrixConfig::Range(_, _, step) if *step <= 0.0 => {
                return Err(format!("matrix `{}` range step must be positive", name));
            }
            MatrixConfig::Linspace(start, stop, _) | MatrixConfig::Logspace(start, stop, _)
                if !(start.is_finite() && stop.is_finite()) =>
            {
                return Err(format!("matrix `{}` bounds must be finite", name));
            }
            _ => {}
        }
        match self.len() {
            0 => Err(format!("matrix `{}` declares no values", name)),
            n if n > MAX_MATRIX_VALUES => Err(format!(
                "matrix `{}` declares {} values; at most {} are allowed",
                name, n, MAX_MATRIX_VALUES
            )),
            _ => Ok(()),
        }
    }
}

fn linspace_at(start: f64, stop: f64, num: u32, index: usize) -> f64 {
    if num <= 1 {
        return start;
    }
    start + (stop - start) / f64::from(num - 1) * index as f64
}

fn power_of_ten(exponent: f64) -> f64 {
    if exponent.fract() == 0.0 {
        10f64.powi(exponent as i32)
    } else {
        10f64.powf(exponent)
    }
}

/// Whole numbers come back as integers.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSearchConfig {
    /// Cap on the number of suggestions; all of them when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_experiments: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomSearchConfig {
    pub n_experiments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    #[default]
    Maximize,
    Minimize,
}

/// Stop the group once `metric` reaches `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EarlyStoppingMetric {
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub optimization: Optimization,
}

/// The `hptuning` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HpTuningConfig {
    /// Experiments run at the same time (default: 1).
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Hyperparameters by name.
    pub matrix: BTreeMap<String, MatrixConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_search: Option<GridSearchConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_search: Option<RandomSearchConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub early_stopping: Vec<EarlyStoppingMetric>,
}

fn default_concurrency() -> u32 {
    1
}

impl HpTuningConfig {
    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.matrix.is_empty() {
            return Err("matrix must declare at least one hyperparameter".to_string());
        }
        if self.grid_search.is_some() && self.random_search.is_some() {
            return Err("grid_search and random_search are mutually exclusive".to_string());
        }
        for (name, matrix) in &self.matrix {
            matrix.validate(name)?;
        }
        if self.random_search.is_none() && self.suggestion_count() > MAX_GRID_SUGGESTIONS {
            return Err(format!(
                "the grid has {} combinations; at most {} are allowed, set grid_search.n_experiments to sample fewer",
                self.grid_size(),
                MAX_GRID_SUGGESTIONS
            ));
        }
        Ok(())
    }

    /// Size of the full cartesian product, saturating at `usize::MAX`.
    pub fn grid_size(&self) -> usize {
        self.matrix
            .values()
            .fold(1usize, |size, matrix| size.saturating_mul(matrix.len()))
    }

    /// Number of suggestions `grid_suggestions` yields.
    pub fn suggestion_count(&self) -> usize {
        match self.grid_search.as_ref().and_then(|g| g.n_experiments) {
            Some(limit) => self.grid_size().min(limit),
            None => self.grid_size(),
        }
    }

    /// Combinations of matrix values, in grid order.
    ///
    /// Parameters vary in name order with the last name changing fastest;
    /// values keep their declared order. `grid_search.n_experiments` caps
    /// the result. Only the yielded combinations are built.
    pub fn grid_suggestions(&self) -> Vec<Map<String, Value>> {
        (0..self.suggestion_count())
            .map(|index| self.suggestion_at(index))
            .collect()
    }

    fn suggestion_at(&self, mut index: usize) -> Map<String, Value> {
        let mut picks = Vec::with_capacity(self.matrix.len());
        for (name, matrix) in self.matrix.iter().rev() {
            let len = matrix.len().max(1);
            if let Some(value) = matrix.value_at(index % len) {
                picks.push((name.clone(), value));
            }
            index /= len;
        }
        picks.into_iter().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hptuning(value: Value) -> HpTuningConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_matrix_values() {
        assert_eq!(MatrixConfig::Range(0.0, 6.0, 2.0).values(), vec![json!(0), json!(2), json!(4)]);
        assert_eq!(
            MatrixConfig::Linspace(0.0, 1.0, 3).values(),
            vec![json!(0), json!(0.5), json!(1)]
        );
        assert_eq!(
            MatrixConfig::Logspace(0.0, 2.0, 3).values(),
            vec![json!(1), json!(10), json!(100)]
        );
        assert!(MatrixConfig::Linspace(0.0, 1.0, 0).values().is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = hptuning(json!({"matrix": {"lr": {"values": [0.1]}}}));
        assert_eq!(config.concurrency, 1);
        assert!(config.grid_search.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grid_suggestions_are_ordered() {
        let config = hptuning(json!({
            "matrix": {
                "lr": {"values": [0.1, 0.01]},
                "batch": {"range": [16, 48, 16]},
            },
        }));
        let suggestions = config.grid_suggestions();
        assert_eq!(
            suggestions,
            vec![
                json!({"batch": 16, "lr": 0.1}),
                json!({"batch": 16, "lr": 0.01}),
                json!({"batch": 32, "lr": 0.1}),
                json!({"batch": 32, "lr": 0.01}),
            ]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_grid_search_caps_suggestions() {
        let config = hptuning(json!({
            "matrix": {"lr": {"linspace": [0, 1, 5]}},
            "grid_search": {"n_experiments": 2},
        }));
        assert_eq!(config.grid_suggestions().len(), 2);
    }

    #[test]
    fn test_search_algorithms_exclusive() {
        let config = hptuning(json!({
            "matrix": {"lr": {"values": [0.1]}},
            "grid_search": {},
            "random_search": {"n_experiments": 3},
        }));
        assert!(config.validate().unwrap_err().contains("mutually exclusive"));
    }

    #[test]
    fn test_invalid_matrix() {
        let config = hptuning(json!({"matrix": {"lr": {"range": [0, 1, 0]}}}));
        assert!(config.validate().is_err());
        let config = hptuning(json!({"matrix": {}}));
        assert!(config.validate().is_err());
        assert!(serde_json::from_value::<HpTuningConfig>(json!({"matrix": {"lr": {"pick": [1]}}})).is_err());
    }

    #[test]
    fn test_matrix_len_is_computed() {
        assert_eq!(MatrixConfig::Range(0.0, 1e12, 1.0).len(), 1_000_000_000_000);
        assert_eq!(MatrixConfig::Range(5.0, 1.0, 1.0).len(), 0);
        assert_eq!(MatrixConfig::Linspace(0.0, 1.0, u32::MAX).len(), u32::MAX as usize);
        assert_eq!(MatrixConfig::Range(0.0, 1.0, 0.25).len(), 4);
        assert_eq!(MatrixConfig::Range(0.0, 1.0, 0.25).value_at(3), Some(json!(0.75)));
        assert_eq!(MatrixConfig::Range(0.0, 1.0, 0.25).value_at(4), None);
    }

    #[test]
    fn test_oversized_matrix_rejected() {
        for matrix in [
            json!({"range": [0, 1e12, 1]}),
            json!({"range": [1e17, 2e17, 1]}),
            json!({"linspace": [0, 1, 4294967295u32]}),
            json!({"logspace": [0, 3, 20000]}),
        ] {
            let config = hptuning(json!({"matrix": {"lr": matrix}}));
            let err = config.validate().unwrap_err();
            assert!(err.contains("at most"), "{matrix}: {err}");
        }
    }

    #[test]
    fn test_oversized_grid_needs_cap() {
        let mut config = hptuning(json!({
            "matrix": {
                "a": {"linspace": [0, 1, 1000]},
                "b": {"linspace": [0, 1, 1000]},
            },
        }));
        assert_eq!(config.grid_size(), 1_000_000);
        assert!(config.validate().unwrap_err().contains("n_experiments"));

        config.grid_search = Some(GridSearchConfig {
            n_experiments: Some(10),
        });
        assert!(config.validate().is_ok());
        assert_eq!(config.suggestion_count(), 10);
        assert_eq!(config.grid_suggestions().len(), 10);

        config.grid_search = None;
        config.random_search = Some(RandomSearchConfig { n_experiments: 5 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_early_stopping() {
        let config = hptuning(json!({
            "matrix": {"lr": {"values": [0.1]}},
            "early_stopping": [{"metric": "loss", "value": 0.01, "optimization": "minimize"}],
        }));
        assert_eq!(config.early_stopping[0].optimization, Optimization::Minimize);
    }
}
