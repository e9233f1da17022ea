//! Executes one solver instance on a dedicated thread.
//!
//! The [`Worker`] owns the algorithm until [`Worker::start`] moves it onto a
//! new OS thread together with the [`Emitter`]. The async side only observes
//! the worker through [`Worker::is_alive`], [`Worker::outcome`] and the
//! receivers handed out by [`Worker::take_outputs`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use mlb_types::{
    Measurement, MlbResult, Problem, RunError, RunOutcome, Solution, SolverError, SolverResult,
    MAX_LOG_LEVEL,
};

use crate::algorithm::{Algorithm, Step};
use crate::context::SolverContext;
use crate::emitter::{Emitter, EmitterConfig, WorkerOutputs};

pub struct Worker {
    name: String,
    problem: Arc<dyn Problem>,
    pending: Mutex<Option<(Algorithm, Emitter)>>,
    outputs: Mutex<Option<WorkerOutputs>>,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    outcome: Arc<Mutex<Option<RunOutcome>>>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        problem: Arc<dyn Problem>,
        algorithm: Algorithm,
        config: EmitterConfig,
    ) -> Self {
        let (emitter, outputs) = Emitter::channel(config);
        Self {
            name: name.into(),
            problem,
            pending: Mutex::new(Some((algorithm, emitter))),
            outputs: Mutex::new(Some(outputs)),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the worker thread. Fails if the worker was started before.
    pub fn start(&self) -> MlbResult<()> {
        let Some((algorithm, emitter)) = self.pending.lock().take() else {
            return Err(RunError::AlreadyRunning {
                worker: self.name.clone(),
            }
            .into());
        };

        let ctx = SolverContext::new(Arc::clone(&self.problem), emitter, Arc::clone(&self.cancel));
        let outcome = Arc::clone(&self.outcome);
        let name = self.name.clone();

        let handle = thread::Builder::new()
            .name(format!("worker-{}", self.name))
            .spawn(move || {
                let result = execute(algorithm, ctx);
                match &result {
                    RunOutcome::Solved(solution) => {
                        info!(worker = %name, evaluation = solution.evaluation, "Worker solved")
                    }
                    RunOutcome::Cancelled => info!(worker = %name, "Worker cancelled"),
                    RunOutcome::Faulted(message) => {
                        warn!(worker = %name, error = %message, "Worker fault")
                    }
                }
                *outcome.lock() = Some(result);
            })?;

        *self.handle.lock() = Some(handle);
        debug!(worker = %self.name, "Worker started");
        Ok(())
    }

    /// Request cooperative cancellation. Safe to call at any time.
    pub fn terminate(&self) {
        if !self.cancel.swap(true, Ordering::Relaxed) {
            debug!(worker = %self.name, "Termination requested");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_alive(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Hand the output receivers to their single consumer.
    pub fn take_outputs(&self) -> Option<WorkerOutputs> {
        self.outputs.lock().take()
    }

    /// How the worker ended, once it has.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.lock().clone()
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Thread body: run the algorithm, announce a solution, and turn errors and
/// panics into a fault.
fn execute(algorithm: Algorithm, mut ctx: SolverContext) -> RunOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(algorithm, &mut ctx)));
    match result {
        Ok(Ok(Some(solution))) => {
            ctx.log_with(
                MAX_LOG_LEVEL,
                format!("Solution {} = {}", solution.candidate, solution.evaluation),
                Duration::ZERO,
                true,
            );
            ctx.viz_with(json!({ "best": solution, "done": true }), Duration::ZERO, true);
            RunOutcome::Solved(solution)
        }
        Ok(Ok(None)) => RunOutcome::Cancelled,
        Ok(Err(err)) => RunOutcome::Faulted(fault(err).to_string()),
        Err(payload) => {
            let err = SolverError::WorkerFault {
                message: panic_message(payload),
            };
            RunOutcome::Faulted(err.to_string())
        }
    }
}

fn fault(err: SolverError) -> SolverError {
    match err {
        SolverError::WorkerFault { .. } => err,
        other => SolverError::WorkerFault {
            message: other.to_string(),
        },
    }
}

fn run(algorithm: Algorithm, ctx: &mut SolverContext) -> SolverResult<Option<Solution>> {
    match algorithm {
        Algorithm::Iterative(mut solver) => {
            solver.initialize(ctx)?;
            let init = json!({
                "initProblem": ctx.problem().describe(),
                "initSolver": solver.describe(),
            });
            ctx.viz_with(init, Duration::ZERO, true);

            let mut last = Measurement::new();
            let mut last_at = Instant::now();
            loop {
                if ctx.is_cancelled() {
                    return Ok(None);
                }
                match solver.step(ctx)? {
                    Step::Done(solution) => return Ok(Some(solution)),
                    Step::Continue => {
                        let mut next = Measurement::new();
                        solver.measure(&last, &mut next);
                        let now = Instant::now();
                        next.stamp(now.duration_since(last_at).as_secs_f64());
                        last_at = now;
                        ctx.msr(next.clone());
                        last = next;
                    }
                }
            }
        }
        Algorithm::Monolithic(mut solver) => {
            solver.initialize(ctx)?;
            solver.solve(ctx)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("worker panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{MonolithicSolver, StepSolver};
    use mlb_problems::{Circuit, Distance};
    use mlb_types::{Candidate, MlbError, SolverError};
    use serde_json::Value;

    fn circuit() -> Arc<dyn Problem> {
        Arc::new(Circuit::new("c", 2, 1, Distance::Cityblock).unwrap())
    }

    fn wait_until_dead(worker: &Worker) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_alive() {
            assert!(Instant::now() < deadline, "worker did not stop");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Counts up to `limit`, or forever when `limit` is `None`.
    struct Counter {
        limit: Option<u32>,
        count: u32,
    }

    impl StepSolver for Counter {
        fn step(&mut self, _ctx: &mut SolverContext) -> SolverResult<Step> {
            self.count += 1;
            if Some(self.count) == self.limit {
                return Ok(Step::Done(Solution::new(Candidate::from(vec![0, 1]), 5.0)));
            }
            thread::sleep(Duration::from_millis(1));
            Ok(Step::Continue)
        }

        fn measure(&mut self, _last: &Measurement, next: &mut Measurement) {
            next.insert("count", self.count);
        }

        fn describe(&self) -> Value {
            json!({ "implementation": "Counter" })
        }
    }

    struct Failing {
        panic: bool,
    }

    impl MonolithicSolver for Failing {
        fn solve(&mut self, _ctx: &mut SolverContext) -> SolverResult<Option<Solution>> {
            if self.panic {
                panic!("boom");
            }
            Err(SolverError::Evaluation {
                message: "bad point".into(),
            })
        }

        fn describe(&self) -> Value {
            json!({ "implementation": "Failing" })
        }
    }

    #[test]
    fn iterative_run_reports_init_and_final_viz() {
        let worker = Worker::new(
            "counter",
            circuit(),
            Algorithm::Iterative(Box::new(Counter { limit: Some(3), count: 0 })),
            EmitterConfig::default(),
        );
        let outputs = worker.take_outputs().unwrap();
        assert!(!worker.is_alive());
        worker.start().unwrap();
        wait_until_dead(&worker);

        let viz: Vec<Value> = outputs.viz.try_iter().collect();
        assert!(viz.first().unwrap().get("initProblem").is_some());
        assert_eq!(viz.first().unwrap()["initSolver"]["implementation"], "Counter");
        let last = viz.last().unwrap();
        assert_eq!(last["done"], true);
        assert_eq!(last["best"]["evaluation"], 5.0);

        let logs: Vec<_> = outputs.log.try_iter().collect();
        assert_eq!(logs.last().unwrap().level, MAX_LOG_LEVEL);

        let first_measure = outputs.measure.try_recv().unwrap();
        assert_eq!(first_measure.get("count"), Some(&json!(1)));
        assert!(first_measure.time().is_some());
        assert!(first_measure.step_duration().unwrap() >= 0.0);

        assert_eq!(
            worker.outcome().and_then(|o| o.solution().cloned()).map(|s| s.evaluation),
            Some(5.0)
        );
    }

    #[test]
    fn terminate_right_after_start_stops_the_worker() {
        let worker = Worker::new(
            "forever",
            circuit(),
            Algorithm::Iterative(Box::new(Counter { limit: None, count: 0 })),
            EmitterConfig::default(),
        );
        worker.start().unwrap();
        worker.terminate();
        wait_until_dead(&worker);
        assert_eq!(worker.outcome(), Some(RunOutcome::Cancelled));
        worker.terminate();
    }

    #[test]
    fn terminate_before_start_is_harmless() {
        let worker = Worker::new(
            "early",
            circuit(),
            Algorithm::Iterative(Box::new(Counter { limit: None, count: 0 })),
            EmitterConfig::default(),
        );
        worker.terminate();
        assert!(!worker.is_alive());
        worker.start().unwrap();
        wait_until_dead(&worker);
        assert_eq!(worker.outcome(), Some(RunOutcome::Cancelled));
    }

    #[test]
    fn second_start_fails() {
        let worker = Worker::new(
            "twice",
            circuit(),
            Algorithm::Iterative(Box::new(Counter { limit: Some(1), count: 0 })),
            EmitterConfig::default(),
        );
        worker.start().unwrap();
        assert!(matches!(
            worker.start(),
            Err(MlbError::Run(RunError::AlreadyRunning { .. }))
        ));
        wait_until_dead(&worker);
    }

    #[test]
    fn errors_and_panics_become_faults() {
        for panic in [false, true] {
            let worker = Worker::new(
                "failing",
                circuit(),
                Algorithm::Monolithic(Box::new(Failing { panic })),
                EmitterConfig::default(),
            );
            worker.start().unwrap();
            wait_until_dead(&worker);
            match worker.outcome() {
                Some(RunOutcome::Faulted(message)) if panic => {
                    assert!(message.starts_with("Worker fault"));
                    assert!(message.contains("boom"));
                }
                Some(RunOutcome::Faulted(message)) => {
                    assert_eq!(message, "Worker fault: Evaluation failed: bad point");
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }
}
