//! Brute-force enumeration of a regular grid over the scope.

use std::sync::Arc;

use serde_json::json;

use mlb_types::{Candidate, ConfigurationError, Dimension, Problem, SolverConfig, ValueKind};

use crate::algorithm::Algorithm;
use crate::optimizers::exhaustive::{CandidateSource, ExhaustiveSearch};

#[derive(Debug, Clone)]
struct Axis {
    dimension: Dimension,
    step: f64,
    count: u64,
}

impl Axis {
    fn new(dimension: Dimension, step: f64) -> Self {
        let step = match dimension.kind {
            ValueKind::Integer => step.round().max(1.0),
            ValueKind::Real => step,
        };
        // tolerate rounding error when the span is an exact multiple of step
        let count = ((dimension.max - dimension.min) / step + 1e-9).floor() as u64 + 1;
        Self {
            dimension,
            step,
            count,
        }
    }

    fn value(&self, index: u64) -> mlb_types::VarValue {
        self.dimension.value_at(self.dimension.min + index as f64 * self.step)
    }
}

/// Mixed-radix counter over the grid. The first dimension varies fastest.
#[derive(Debug, Clone)]
pub struct GridCursor {
    axes: Vec<Axis>,
    counter: Vec<u64>,
    exhausted: bool,
}

impl GridCursor {
    pub fn new(dimensions: &[Dimension], step: f64) -> Self {
        let axes: Vec<Axis> = dimensions.iter().map(|d| Axis::new(*d, step)).collect();
        Self {
            counter: vec![0; axes.len()],
            exhausted: axes.is_empty(),
            axes,
        }
    }

    fn advance(&mut self) {
        for (digit, axis) in self.counter.iter_mut().zip(&self.axes) {
            *digit += 1;
            if *digit < axis.count {
                return;
            }
            *digit = 0;
        }
        self.exhausted = true;
    }
}

impl CandidateSource for GridCursor {
    fn next_candidate(&mut self) -> Option<Candidate> {
        if self.exhausted {
            return None;
        }
        let candidate = Candidate::new(
            self.axes
                .iter()
                .zip(&self.counter)
                .map(|(axis, k)| axis.value(*k))
                .collect(),
        );
        self.advance();
        Some(candidate)
    }

    fn cardinality(&self) -> Option<u64> {
        self.axes
            .iter()
            .try_fold(1u64, |total, axis| total.checked_mul(axis.count))
    }
}

pub struct BruteForce;

impl BruteForce {
    pub const IMPLEMENTATION: &'static str = "BruteForce";

    pub fn from_config(
        config: &SolverConfig,
        problem: Arc<dyn Problem>,
    ) -> Result<Algorithm, ConfigurationError> {
        let step = config
            .parameters
            .float(Self::IMPLEMENTATION, "step", Some(1.0))?;
        if step <= 0.0 {
            return Err(ConfigurationError::invalid(
                Self::IMPLEMENTATION,
                "step",
                format!("must be positive, got {step}"),
            ));
        }
        let scope = problem.scope();
        scope.validate()?;

        let description = json!({
            "name": config.name,
            "implementation": Self::IMPLEMENTATION,
            "step": step,
        });
        let search = ExhaustiveSearch::new(description, GridCursor::new(&scope.dimensions, step));
        Ok(Algorithm::Iterative(Box::new(search)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;

    use mlb_problems::{Circuit, Distance, Function};
    use mlb_types::{Parameters, Scope, Solution, VarValue};

    use crate::algorithm::{Step, StepSolver};
    use crate::context::SolverContext;
    use crate::emitter::{Emitter, EmitterConfig};

    fn drain(cursor: &mut GridCursor) -> Vec<Candidate> {
        std::iter::from_fn(|| cursor.next_candidate()).collect()
    }

    fn solve(problem: Arc<dyn Problem>, step: f64) -> Solution {
        let (emitter, _outputs) = Emitter::channel(EmitterConfig::default());
        let mut ctx = SolverContext::new(Arc::clone(&problem), emitter, Arc::new(AtomicBool::new(false)));
        let mut search = ExhaustiveSearch::new(json!({}), GridCursor::new(&problem.scope().dimensions, step));
        loop {
            if let Step::Done(solution) = search.step(&mut ctx).unwrap() {
                return solution;
            }
        }
    }

    #[test]
    fn first_dimension_varies_fastest() {
        let scope = Scope::new().add_integer(0, 1).add_integer(5, 6);
        let mut cursor = GridCursor::new(&scope.dimensions, 1.0);
        let points: Vec<Vec<i64>> = drain(&mut cursor)
            .iter()
            .map(|c| c.values().iter().map(VarValue::as_i64).collect())
            .collect();
        assert_eq!(points, vec![vec![0, 5], vec![1, 5], vec![0, 6], vec![1, 6]]);
    }

    #[test]
    fn visits_every_grid_point_exactly_once() {
        let scope = Scope::new()
            .add_integer(0, 4)
            .add_real(-1.0, 1.0)
            .add_integer(-3, 3);
        let mut cursor = GridCursor::new(&scope.dimensions, 2.0);
        // 3 * 2 * 4
        assert_eq!(cursor.cardinality(), Some(24));
        let points = drain(&mut cursor);
        assert_eq!(points.len(), 24);
        let unique: HashSet<String> = points.iter().map(|c| c.to_string()).collect();
        assert_eq!(unique.len(), 24);
        assert!(points.iter().all(|c| scope.contains(c)));
        assert!(cursor.next_candidate().is_none());
    }

    #[test]
    fn real_step_hits_the_upper_bound() {
        let scope = Scope::new().add_real(0.0, 1.0);
        let mut cursor = GridCursor::new(&scope.dimensions, 0.1);
        assert_eq!(drain(&mut cursor).len(), 11);
    }

    #[test]
    fn integer_step_is_rounded_to_at_least_one() {
        let scope = Scope::new().add_integer(0, 3);
        let mut cursor = GridCursor::new(&scope.dimensions, 0.3);
        assert_eq!(cursor.cardinality(), Some(4));
        assert_eq!(drain(&mut cursor).len(), 4);
    }

    #[test]
    fn finds_the_true_minimum_of_a_small_grid() {
        let f: Arc<dyn Problem> = Arc::new(
            Function::new("bowl", "(x[0] - 1)^2 + (x[1] + 1)^2", 2, -2.0, 2.0).unwrap(),
        );
        let solution = solve(f, 1.0);
        assert_eq!(solution.evaluation, 0.0);
        assert_eq!(solution.candidate, Candidate::from(vec![1.0, -1.0]));
    }

    #[test]
    fn circuit_2x2_cityblock_solution_is_a_non_negative_integer() {
        let circuit: Arc<dyn Problem> = Arc::new(Circuit::new("c", 2, 2, Distance::Cityblock).unwrap());
        let solution = solve(circuit, 1.0);
        assert!(solution.evaluation >= 0.0);
        assert_eq!(solution.evaluation.fract(), 0.0);
        // the optimum is the identity layout or one of its symmetries
        assert_eq!(solution.evaluation, 20.0);
        assert!(solution.candidate.all_distinct());
    }

    #[test]
    fn from_config_validates_step() {
        let circuit: Arc<dyn Problem> = Arc::new(Circuit::new("c", 2, 2, Distance::Cityblock).unwrap());
        let bad = SolverConfig::new("bf", "BruteForce").with_parameters(Parameters::new().with("step", 0));
        assert!(BruteForce::from_config(&bad, Arc::clone(&circuit)).is_err());

        let ok = SolverConfig::new("bf", "BruteForce");
        let algorithm = BruteForce::from_config(&ok, circuit).unwrap();
        assert!(algorithm.is_iterative());
        assert_eq!(algorithm.describe()["candidates"], 256);
    }
}
