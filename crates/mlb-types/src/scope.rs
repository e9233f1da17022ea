//! Search-space description and candidate values.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Value kind of a single decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Real,
}

/// One dimension of the search space: `(kind, min, max)`, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub kind: ValueKind,
    pub min: f64,
    pub max: f64,
}

impl Dimension {
    pub fn integer(min: i64, max: i64) -> Self {
        Self {
            kind: ValueKind::Integer,
            min: min as f64,
            max: max as f64,
        }
    }

    pub fn real(min: f64, max: f64) -> Self {
        Self {
            kind: ValueKind::Real,
            min,
            max,
        }
    }

    /// Whether `value` has this dimension's kind and lies within its bounds.
    pub fn admits(&self, value: &VarValue) -> bool {
        let kind_ok = match (self.kind, value) {
            (ValueKind::Integer, VarValue::Int(_)) => true,
            (ValueKind::Real, _) => true,
            (ValueKind::Integer, VarValue::Real(_)) => false,
        };
        let v = value.as_f64();
        kind_ok && v >= self.min && v <= self.max
    }

    /// Convert a raw coordinate into a value of this dimension's kind.
    pub fn value_at(&self, raw: f64) -> VarValue {
        match self.kind {
            ValueKind::Integer => VarValue::Int(raw.round() as i64),
            ValueKind::Real => VarValue::Real(raw),
        }
    }
}

/// A concrete value of one decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Int(i64),
    Real(f64),
}

impl VarValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Real(v) => *v,
        }
    }

    /// Integer view; real values are truncated towards zero.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            Self::Real(v) => *v as i64,
        }
    }
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:.3}"),
        }
    }
}

/// One point in the search space, a value per dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(pub Vec<VarValue>);

impl Candidate {
    pub fn new(values: Vec<VarValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[VarValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.0.iter().map(VarValue::as_f64).collect()
    }

    /// True when no two values are equal.
    pub fn all_distinct(&self) -> bool {
        self.0.iter().enumerate().all(|(i, a)| {
            self.0[i + 1..]
                .iter()
                .all(|b| a.as_f64() != b.as_f64())
        })
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<i64>> for Candidate {
    fn from(values: Vec<i64>) -> Self {
        Self(values.into_iter().map(VarValue::Int).collect())
    }
}

impl From<Vec<f64>> for Candidate {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_iter().map(VarValue::Real).collect())
    }
}

/// The full search space: an ordered list of dimensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    pub dimensions: Vec<Dimension>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn add_integer(mut self, min: i64, max: i64) -> Self {
        self.dimensions.push(Dimension::integer(min, max));
        self
    }

    pub fn add_real(mut self, min: f64, max: f64) -> Self {
        self.dimensions.push(Dimension::real(min, max));
        self
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dimension> {
        self.dimensions.iter()
    }

    pub fn all_integer(&self) -> bool {
        self.dimensions.iter().all(|d| d.kind == ValueKind::Integer)
    }

    /// Reject empty scopes, inverted or non-finite bounds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.dimensions.is_empty() {
            return Err(ConfigurationError::InvalidScope {
                message: "scope has no dimensions".into(),
            });
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if !dim.min.is_finite() || !dim.max.is_finite() {
                return Err(ConfigurationError::InvalidScope {
                    message: format!("dimension {i} has non-finite bounds"),
                });
            }
            if dim.min > dim.max {
                return Err(ConfigurationError::InvalidScope {
                    message: format!("dimension {i}: min {} > max {}", dim.min, dim.max),
                });
            }
        }
        Ok(())
    }

    /// Whether the candidate has one admissible value per dimension.
    pub fn contains(&self, candidate: &Candidate) -> bool {
        candidate.len() == self.len()
            && self
                .dimensions
                .iter()
                .zip(candidate.values())
                .all(|(dim, value)| dim.admits(value))
    }
}
