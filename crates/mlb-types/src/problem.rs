//! The problem contract consumed by solvers.

use serde::{Deserialize, Serialize};

use crate::scope::{Candidate, Scope};

/// Capability tags used to group problems and solvers and to check that a
/// solver can work on a given problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Optimization,
    Clustering,
    Classification,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimization => "optimization",
            Self::Clustering => "clustering",
            Self::Classification => "classification",
        }
    }
}

/// A problem definition: a search space plus an evaluation and ranking
/// function.
///
/// Implementations are immutable after construction and shared read-only with
/// the worker running a solver, so every method must be free of side effects.
pub trait Problem: Send + Sync {
    /// Instance name, for identification.
    fn name(&self) -> &str;

    /// Ordered `(kind, min, max)` description of every decision variable.
    fn scope(&self) -> &Scope;

    /// Score a candidate. Candidates outside the problem's domain must still
    /// produce a score (typically a penalty) rather than fail.
    fn evaluate(&self, candidate: &Candidate) -> f64;

    /// Whether score `a` is preferred over score `b`.
    fn is_better(&self, a: f64, b: f64) -> bool;

    /// Payload sent to observers when a run starts.
    fn describe(&self) -> serde_json::Value;
}
