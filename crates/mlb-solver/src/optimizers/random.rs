//! Uniform random sampling of the scope, run as a single call.

use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

use mlb_types::{
    Candidate, ConfigurationError, Dimension, Measurement, Problem, Solution, SolverConfig,
    SolverResult, ValueKind, VarValue,
};

use crate::algorithm::{Algorithm, MonolithicSolver};
use crate::context::SolverContext;
use crate::optimizers::exhaustive::{best_json, IMPROVEMENT_LOG_LEVEL};

pub struct RandomSampler {
    name: String,
    samples: u64,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl RandomSampler {
    pub const IMPLEMENTATION: &'static str = "RandomSampler";

    pub fn new(name: impl Into<String>, samples: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            name: name.into(),
            samples,
            seed,
            rng,
        }
    }

    pub fn from_config(
        config: &SolverConfig,
        problem: Arc<dyn Problem>,
    ) -> Result<Algorithm, ConfigurationError> {
        let params = &config.parameters;
        let samples = params.integer(Self::IMPLEMENTATION, "samples", Some(1000))?;
        let samples = u64::try_from(samples)
            .ok()
            .filter(|s| *s >= 1)
            .ok_or_else(|| {
                ConfigurationError::invalid(Self::IMPLEMENTATION, "samples", "must be at least 1")
            })?;
        let seed = match params.get("seed") {
            Some(_) => Some(params.integer(Self::IMPLEMENTATION, "seed", None)? as u64),
            None => None,
        };
        problem.scope().validate()?;
        Ok(Algorithm::Monolithic(Box::new(Self::new(
            config.name.clone(),
            samples,
            seed,
        ))))
    }

    fn sample(&mut self, dimension: &Dimension) -> VarValue {
        match dimension.kind {
            ValueKind::Integer => {
                VarValue::Int(self.rng.gen_range(dimension.min as i64..=dimension.max as i64))
            }
            ValueKind::Real => VarValue::Real(self.rng.gen_range(dimension.min..=dimension.max)),
        }
    }
}

impl MonolithicSolver for RandomSampler {
    fn solve(&mut self, ctx: &mut SolverContext) -> SolverResult<Option<Solution>> {
        let problem = Arc::clone(ctx.problem());
        let mut best: Option<Solution> = None;
        let mut last_at = Instant::now();

        for drawn in 1..=self.samples {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let candidate = Candidate::new(
                problem
                    .scope()
                    .iter()
                    .map(|dimension| self.sample(dimension))
                    .collect(),
            );
            let evaluation = problem.evaluate(&candidate);
            let improved = best
                .as_ref()
                .map_or(true, |b| problem.is_better(evaluation, b.evaluation));
            if improved {
                ctx.log(
                    IMPROVEMENT_LOG_LEVEL,
                    format!("New best {candidate} = {evaluation}"),
                );
                best = Some(Solution::new(candidate.clone(), evaluation));
            }
            ctx.viz(json!({
                "current": { "solution": candidate, "evaluation": evaluation },
                "best": best_json(best.as_ref()),
            }));

            let mut measurement = Measurement::new()
                .with("samples", drawn)
                .with("bestEvaluation", best.as_ref().map(|b| b.evaluation));
            let now = Instant::now();
            measurement.stamp(now.duration_since(last_at).as_secs_f64());
            last_at = now;
            ctx.msr(measurement);
        }
        Ok(best)
    }

    fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "implementation": Self::IMPLEMENTATION,
            "samples": self.samples,
            "seed": self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use mlb_problems::{Circuit, Distance, Function};
    use mlb_types::Parameters;

    use crate::emitter::{Emitter, EmitterConfig};

    fn run(problem: Arc<dyn Problem>, sampler: &mut RandomSampler, cancelled: bool) -> Option<Solution> {
        let (emitter, _outputs) = Emitter::channel(EmitterConfig::default());
        let mut ctx = SolverContext::new(problem, emitter, Arc::new(AtomicBool::new(cancelled)));
        sampler.solve(&mut ctx).unwrap()
    }

    #[test]
    fn reproducible_under_fixed_seed() {
        let f: Arc<dyn Problem> =
            Arc::new(Function::new("f", "x[0]^2 + x[1]^2", 2, -3.0, 3.0).unwrap());
        let a = run(Arc::clone(&f), &mut RandomSampler::new("a", 200, Some(7)), false).unwrap();
        let b = run(Arc::clone(&f), &mut RandomSampler::new("b", 200, Some(7)), false).unwrap();
        assert_eq!(a, b);
        assert!(f.scope().contains(&a.candidate));
    }

    #[test]
    fn integer_samples_stay_within_bounds() {
        let circuit: Arc<dyn Problem> = Arc::new(Circuit::new("c", 3, 1, Distance::Cityblock).unwrap());
        let best = run(Arc::clone(&circuit), &mut RandomSampler::new("r", 500, Some(1)), false).unwrap();
        assert!(circuit.scope().contains(&best.candidate));
        // 2 of the 27 placements are optimal
        assert_eq!(best.evaluation, 10.0);
    }

    #[test]
    fn stops_when_cancelled() {
        let f: Arc<dyn Problem> = Arc::new(Function::new("f", "x", 1, 0.0, 1.0).unwrap());
        assert_eq!(run(f, &mut RandomSampler::new("r", 10, Some(3)), true), None);
    }

    #[test]
    fn from_config_parses_parameters() {
        let f: Arc<dyn Problem> = Arc::new(Function::new("f", "x", 1, 0.0, 1.0).unwrap());
        let config = SolverConfig::new("r", "RandomSampler")
            .with_parameters(Parameters::new().with("samples", "50").with("seed", 9));
        let algorithm = RandomSampler::from_config(&config, Arc::clone(&f)).unwrap();
        assert!(!algorithm.is_iterative());
        assert_eq!(algorithm.describe()["samples"], 50);
        assert_eq!(algorithm.describe()["seed"], 9);

        let bad = SolverConfig::new("r", "RandomSampler")
            .with_parameters(Parameters::new().with("samples", 0));
        assert!(RandomSampler::from_config(&bad, f).is_err());
    }
}
