//! A user-supplied function of a real vector, to be minimized.

use mlb_types::{Candidate, ConfigurationError, Parameters, Problem, ProblemConfig, Scope};
use serde_json::json;

use crate::expression::CompiledExpression;

/// Largest accepted `dimension`.
pub const MAX_DIMENSION: usize = 10_000;

#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    expression: String,
    compiled: CompiledExpression,
    scope: Scope,
}

impl Function {
    pub const IMPLEMENTATION: &'static str = "Function";

    pub fn new(
        name: impl Into<String>,
        expression: impl Into<String>,
        dimension: usize,
        range_min: f64,
        range_max: f64,
    ) -> Result<Self, ConfigurationError> {
        let expression = expression.into();
        if dimension == 0 {
            return Err(ConfigurationError::invalid(Self::IMPLEMENTATION, "dimension", "must be >= 1"));
        }
        if dimension > MAX_DIMENSION {
            return Err(ConfigurationError::invalid(
                Self::IMPLEMENTATION,
                "dimension",
                format!("must be at most {MAX_DIMENSION}"),
            ));
        }
        if range_min > range_max {
            return Err(ConfigurationError::invalid(
                Self::IMPLEMENTATION,
                "rangeMin",
                format!("{range_min} is greater than rangeMax {range_max}"),
            ));
        }
        let compiled = CompiledExpression::compile(&expression, dimension).map_err(|message| {
            ConfigurationError::InvalidExpression {
                expression: expression.clone(),
                message,
            }
        })?;
        let scope = Scope {
            dimensions: (0..dimension)
                .map(|_| mlb_types::Dimension::real(range_min, range_max))
                .collect(),
        };
        Ok(Self {
            name: name.into(),
            expression,
            compiled,
            scope,
        })
    }

    pub fn from_config(config: &ProblemConfig) -> Result<Self, ConfigurationError> {
        Self::from_parameters(&config.name, &config.parameters)
    }

    pub fn from_parameters(name: &str, params: &Parameters) -> Result<Self, ConfigurationError> {
        let expression = params.string(Self::IMPLEMENTATION, "expression", None)?;
        let dimension = params.integer(Self::IMPLEMENTATION, "dimension", None)?;
        let dimension = usize::try_from(dimension).map_err(|_| {
            ConfigurationError::invalid(Self::IMPLEMENTATION, "dimension", "must be >= 1")
        })?;
        let range_min = params.float(Self::IMPLEMENTATION, "rangeMin", None)?;
        let range_max = params.float(Self::IMPLEMENTATION, "rangeMax", None)?;
        Self::new(name, expression, dimension, range_min, range_max)
    }
}

impl Problem for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Invalid points (division by zero, non-finite results) score `+inf`.
    fn evaluate(&self, candidate: &Candidate) -> f64 {
        match self.compiled.evaluate(&candidate.to_f64_vec()) {
            Ok(v) if v.is_finite() => v,
            _ => f64::INFINITY,
        }
    }

    fn is_better(&self, a: f64, b: f64) -> bool {
        a < b
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "implementation": Self::IMPLEMENTATION,
            "expression": self.expression,
            "scope": self.scope,
        })
    }
}
