//! Solver traits and the two execution modes a worker knows about.

use serde_json::Value;

use mlb_types::{Measurement, Solution, SolverResult};

use crate::context::SolverContext;

/// Result of one iteration of an iterative solver.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue,
    Done(Solution),
}

/// A solver the worker drives one step at a time.
///
/// The worker checks for cancellation between steps and, after every
/// [`Step::Continue`], builds a fresh measurement through [`StepSolver::measure`].
pub trait StepSolver: Send {
    fn initialize(&mut self, _ctx: &mut SolverContext) -> SolverResult<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut SolverContext) -> SolverResult<Step>;

    /// Add solver-specific entries to `next`. `last` is the previous
    /// measurement, empty before the first one. `_time` and `_stepDuration`
    /// are stamped by the worker afterwards.
    fn measure(&mut self, _last: &Measurement, _next: &mut Measurement) {}

    /// Shown to observers as `initSolver`.
    fn describe(&self) -> Value;
}

/// A solver that runs to completion in a single call.
pub trait MonolithicSolver: Send {
    fn initialize(&mut self, _ctx: &mut SolverContext) -> SolverResult<()> {
        Ok(())
    }

    /// Returns `None` when stopped by cancellation.
    fn solve(&mut self, ctx: &mut SolverContext) -> SolverResult<Option<Solution>>;

    fn describe(&self) -> Value;
}

pub enum Algorithm {
    Iterative(Box<dyn StepSolver>),
    Monolithic(Box<dyn MonolithicSolver>),
}

impl Algorithm {
    pub fn describe(&self) -> Value {
        match self {
            Self::Iterative(solver) => solver.describe(),
            Self::Monolithic(solver) => solver.describe(),
        }
    }

    pub fn is_iterative(&self) -> bool {
        matches!(self, Self::Iterative(_))
    }
}

impl std::fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_iterative() { "Iterative" } else { "Monolithic" };
        f.debug_tuple(mode).field(&self.describe()).finish()
    }
}
