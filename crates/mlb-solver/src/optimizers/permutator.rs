//! Enumeration restricted to candidates whose values are pairwise distinct.
//!
//! All dimensions draw from one shared pool of integers. Candidates are the
//! k-permutations of that pool, in lexicographic order.

use std::sync::Arc;

use serde_json::json;

use mlb_types::{Candidate, ConfigurationError, Problem, Scope, SolverConfig, VarValue};

use crate::algorithm::Algorithm;
use crate::optimizers::exhaustive::{CandidateSource, ExhaustiveSearch};

#[derive(Debug, Clone)]
pub struct PermutationCursor {
    pool: Vec<i64>,
    /// Indices into `pool` of the current candidate.
    indices: Vec<usize>,
    exhausted: bool,
}

impl PermutationCursor {
    /// `pool` must hold distinct values in ascending order, at least `k` of them.
    pub fn new(pool: Vec<i64>, k: usize) -> Self {
        Self {
            exhausted: k == 0 || pool.len() < k,
            indices: (0..k).collect(),
            pool,
        }
    }

    /// Value pool shared by all dimensions: `lo, lo + step, ...` up to the
    /// widest bound, extended past it when it is shorter than the scope.
    pub fn pool_for(scope: &Scope, step: i64) -> Vec<i64> {
        let lo = scope.iter().map(|d| d.min as i64).min().unwrap_or(0);
        let hi = scope.iter().map(|d| d.max as i64).max().unwrap_or(0);
        let mut pool: Vec<i64> = (lo..=hi).step_by(step.max(1) as usize).collect();
        while pool.len() < scope.len() {
            pool.push(lo + pool.len() as i64 * step);
        }
        pool
    }

    /// Move to the lexicographically next arrangement.
    fn advance(&mut self) {
        let n = self.pool.len();
        let k = self.indices.len();
        let mut used = vec![false; n];
        for &i in &self.indices {
            used[i] = true;
        }
        for pos in (0..k).rev() {
            used[self.indices[pos]] = false;
            if let Some(next) = (self.indices[pos] + 1..n).find(|&j| !used[j]) {
                self.indices[pos] = next;
                used[next] = true;
                let mut free = (0..n).filter(|&j| !used[j]);
                for slot in pos + 1..k {
                    if let Some(j) = free.next() {
                        self.indices[slot] = j;
                    }
                }
                return;
            }
        }
        self.exhausted = true;
    }
}

impl CandidateSource for PermutationCursor {
    fn next_candidate(&mut self) -> Option<Candidate> {
        if self.exhausted {
            return None;
        }
        let candidate = Candidate::new(
            self.indices
                .iter()
                .map(|&i| VarValue::Int(self.pool[i]))
                .collect(),
        );
        self.advance();
        Some(candidate)
    }

    fn cardinality(&self) -> Option<u64> {
        let n = self.pool.len() as u64;
        let k = self.indices.len() as u64;
        if k > n {
            return Some(0);
        }
        (n - k + 1..=n).try_fold(1u64, |total, f| total.checked_mul(f))
    }
}

pub struct Permutator;

impl Permutator {
    pub const IMPLEMENTATION: &'static str = "Permutator";

    pub fn from_config(
        config: &SolverConfig,
        problem: Arc<dyn Problem>,
    ) -> Result<Algorithm, ConfigurationError> {
        let step = config
            .parameters
            .integer(Self::IMPLEMENTATION, "step", Some(1))?;
        if step < 1 {
            return Err(ConfigurationError::invalid(
                Self::IMPLEMENTATION,
                "step",
                format!("must be at least 1, got {step}"),
            ));
        }
        let scope = problem.scope();
        scope.validate()?;
        if !scope.all_integer() {
            return Err(ConfigurationError::InvalidScope {
                message: format!("{} needs integer dimensions only", Self::IMPLEMENTATION),
            });
        }

        let pool = PermutationCursor::pool_for(scope, step);
        let description = json!({
            "name": config.name,
            "implementation": Self::IMPLEMENTATION,
            "step": step,
            "pool": pool,
        });
        let cursor = PermutationCursor::new(pool, scope.len());
        Ok(Algorithm::Iterative(Box::new(ExhaustiveSearch::new(description, cursor))))
    }
}
