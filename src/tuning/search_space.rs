//! Hyperparameter search space
//!
//! Parameters keep their declaration order so a seeded sampler
//! produces identical trials run to run.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tunable parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Parameter {
    /// Uniform float range
    Float { low: f64, high: f64 },
    /// Inclusive integer range
    Int { low: i64, high: i64 },
    /// Fixed numeric grid
    Discrete { values: Vec<f64> },
    /// Fixed string choices
    Categorical { choices: Vec<String> },
    Boolean,
}

/// A sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One trial's sampled parameters
pub type TrialParams = HashMap<String, ParameterValue>;

/// Named parameters to search over
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<(String, Parameter)>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: &str, low: f64, high: f64) -> Self {
        self.parameters
            .push((name.to_string(), Parameter::Float { low, high }));
        self
    }

    pub fn add_int(mut self, name: &str, low: i64, high: i64) -> Self {
        self.parameters
            .push((name.to_string(), Parameter::Int { low, high }));
        self
    }

    pub fn add_discrete(mut self, name: &str, values: &[f64]) -> Self {
        self.parameters.push((
            name.to_string(),
            Parameter::Discrete {
                values: values.to_vec(),
            },
        ));
        self
    }

    pub fn add_categorical(mut self, name: &str, choices: &[&str]) -> Self {
        self.parameters.push((
            name.to_string(),
            Parameter::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        ));
        self
    }

    pub fn add_boolean(mut self, name: &str) -> Self {
        self.parameters.push((name.to_string(), Parameter::Boolean));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Draw one configuration
    pub fn sample<R: Rng>(&self, rng: &mut R) -> TrialParams {
        let mut params = TrialParams::new();
        for (name, param) in &self.parameters {
            let value = match param {
                Parameter::Float { low, high } => {
                    if high > low {
                        ParameterValue::Float(rng.gen_range(*low..=*high))
                    } else {
                        ParameterValue::Float(*low)
                    }
                }
                Parameter::Int { low, high } => {
                    if high > low {
                        ParameterValue::Int(rng.gen_range(*low..=*high))
                    } else {
                        ParameterValue::Int(*low)
                    }
                }
                Parameter::Discrete { values } => {
                    if values.is_empty() {
                        continue;
                    }
                    ParameterValue::Float(values[rng.gen_range(0..values.len())])
                }
                Parameter::Categorical { choices } => {
                    if choices.is_empty() {
                        continue;
                    }
                    ParameterValue::String(choices[rng.gen_range(0..choices.len())].clone())
                }
                Parameter::Boolean => ParameterValue::Bool(rng.gen()),
            };
            params.insert(name.clone(), value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sample_covers_all_parameters() {
        let space = SearchSpace::new()
            .add_float("lr", 0.01, 0.3)
            .add_int("depth", 2, 8)
            .add_discrete("n_estimators", &[100.0, 200.0, 300.0])
            .add_categorical("kind", &["a", "b"])
            .add_boolean("flag");

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let params = space.sample(&mut rng);
        assert_eq!(params.len(), 5);

        let lr = params["lr"].as_f64().unwrap();
        assert!((0.01..=0.3).contains(&lr));

        let depth = params["depth"].as_i64().unwrap();
        assert!((2..=8).contains(&depth));

        let n = params["n_estimators"].as_f64().unwrap();
        assert!([100.0, 200.0, 300.0].contains(&n));

        assert!(["a", "b"].contains(&params["kind"].as_str().unwrap()));
        assert!(params["flag"].as_bool().is_some());
    }

    #[test]
    fn test_sampling_deterministic_per_seed() {
        let space = SearchSpace::new()
            .add_discrete("a", &[1.0, 2.0, 3.0])
            .add_float("b", 0.0, 1.0)
            .add_int("c", 0, 100);

        let mut r1 = ChaCha8Rng::seed_from_u64(5);
        let mut r2 = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            assert_eq!(space.sample(&mut r1), space.sample(&mut r2));
        }
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(ParameterValue::Float(2.7).as_i64(), Some(3));
        assert_eq!(ParameterValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(ParameterValue::Int(-1).as_usize(), None);
        assert_eq!(ParameterValue::String("x".into()).as_f64(), None);
        assert_eq!(ParameterValue::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn test_degenerate_range_returns_low() {
        let space = SearchSpace::new().add_float("x", 1.5, 1.5);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let params = space.sample(&mut rng);
        assert_eq!(params["x"], ParameterValue::Float(1.5));
    }
}
