//! Resolved run requests and typed access to user-supplied parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ConfigurationError;

/// User-supplied parameter mapping of a problem or solver.
///
/// Numeric parameters also accept numeric strings, since parameters typed
/// into a form usually arrive as text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Integer parameter; `default` of `None` makes it required.
    pub fn integer(
        &self,
        component: &str,
        key: &str,
        default: Option<i64>,
    ) -> Result<i64, ConfigurationError> {
        let Some(value) = self.get(key) else {
            return default.ok_or_else(|| ConfigurationError::missing(component, key));
        };
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ConfigurationError::invalid(component, key, format!("expected an integer, got {value}"))
        })
    }

    /// Float parameter; `default` of `None` makes it required.
    pub fn float(
        &self,
        component: &str,
        key: &str,
        default: Option<f64>,
    ) -> Result<f64, ConfigurationError> {
        let Some(value) = self.get(key) else {
            return default.ok_or_else(|| ConfigurationError::missing(component, key));
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|f| f.is_finite()).ok_or_else(|| {
            ConfigurationError::invalid(component, key, format!("expected a number, got {value}"))
        })
    }

    /// String parameter; `default` of `None` makes it required.
    pub fn string(
        &self,
        component: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<String, ConfigurationError> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ConfigurationError::invalid(
                component,
                key,
                format!("expected a string, got {other}"),
            )),
            None => default
                .map(str::to_string)
                .ok_or_else(|| ConfigurationError::missing(component, key)),
        }
    }
}

/// Resolved problem record handed over by the definition store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    #[serde(default)]
    pub name: String,
    pub implementation: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub dataset: Option<Value>,
}

impl ProblemConfig {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            parameters: Parameters::new(),
            dataset: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Resolved solver record handed over by the definition store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub name: String,
    pub implementation: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl SolverConfig {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Everything needed to start one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub solver: SolverConfig,
    pub problem: ProblemConfig,
}

impl RunRequest {
    pub fn new(solver: SolverConfig, problem: ProblemConfig) -> Self {
        Self { solver, problem }
    }
}
