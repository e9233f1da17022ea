//! Shared driver of the enumerating optimizers.
//!
//! An [`ExhaustiveSearch`] pulls candidates from a [`CandidateSource`], one
//! per step, evaluates them and keeps the best so far. When the source runs
//! dry the next step returns the best solution.

use serde_json::{json, Value};

use mlb_types::{Candidate, Measurement, Solution, SolverError, SolverResult};

use crate::algorithm::{Step, StepSolver};
use crate::context::SolverContext;

/// Log level of a step that improved on the best so far.
pub const IMPROVEMENT_LOG_LEVEL: u8 = 5;
/// Log level of an ordinary step.
pub const STEP_LOG_LEVEL: u8 = 1;

/// Ordered, finite stream of candidates.
pub trait CandidateSource: Send {
    fn next_candidate(&mut self) -> Option<Candidate>;

    /// Number of candidates the source yields in total, if it fits in a `u64`.
    fn cardinality(&self) -> Option<u64>;
}

pub struct ExhaustiveSearch<S> {
    description: Value,
    source: S,
    best: Option<Solution>,
    evaluations: u64,
}

impl<S: CandidateSource> ExhaustiveSearch<S> {
    pub fn new(description: Value, source: S) -> Self {
        Self {
            description,
            source,
            best: None,
            evaluations: 0,
        }
    }

    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}

impl<S: CandidateSource> StepSolver for ExhaustiveSearch<S> {
    fn step(&mut self, ctx: &mut SolverContext) -> SolverResult<Step> {
        let Some(candidate) = self.source.next_candidate() else {
            return match self.best.take() {
                Some(best) => Ok(Step::Done(best)),
                None => Err(SolverError::Evaluation {
                    message: "search space is empty".into(),
                }),
            };
        };

        let evaluation = ctx.problem().evaluate(&candidate);
        self.evaluations += 1;

        let improved = match &self.best {
            Some(best) => ctx.problem().is_better(evaluation, best.evaluation),
            None => true,
        };
        if improved {
            ctx.log(
                IMPROVEMENT_LOG_LEVEL,
                format!("New best {candidate} = {evaluation}"),
            );
            self.best = Some(Solution::new(candidate.clone(), evaluation));
        } else {
            ctx.log(STEP_LOG_LEVEL, format!("Evaluated {candidate} = {evaluation}"));
        }

        ctx.viz(json!({
            "current": { "solution": candidate, "evaluation": evaluation },
            "best": best_json(self.best.as_ref()),
        }));
        Ok(Step::Continue)
    }

    fn measure(&mut self, _last: &Measurement, next: &mut Measurement) {
        next.insert("evaluations", self.evaluations);
        next.insert(
            "bestEvaluation",
            self.best.as_ref().map_or(Value::Null, |b| json!(b.evaluation)),
        );
    }

    fn describe(&self) -> Value {
        let mut description = self.description.clone();
        if let Some(object) = description.as_object_mut() {
            object.insert("candidates".into(), json!(self.source.cardinality()));
        }
        description
    }
}

/// `{"solution": ..., "evaluation": ...}`, with nulls before the first step.
pub(crate) fn best_json(best: Option<&Solution>) -> Value {
    match best {
        Some(best) => json!({ "solution": best.candidate, "evaluation": best.evaluation }),
        None => json!({ "solution": null, "evaluation": null }),
    }
}
