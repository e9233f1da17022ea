//! What a running solver can see and do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use mlb_types::{Measurement, Problem};

use crate::emitter::Emitter;

/// Handle given to solver code on the worker thread: the problem, the
/// cancellation flag and the rate-limited output channels.
pub struct SolverContext {
    problem: Arc<dyn Problem>,
    emitter: Emitter,
    cancel: Arc<AtomicBool>,
}

impl SolverContext {
    pub fn new(problem: Arc<dyn Problem>, emitter: Emitter, cancel: Arc<AtomicBool>) -> Self {
        Self {
            problem,
            emitter,
            cancel,
        }
    }

    pub fn problem(&self) -> &Arc<dyn Problem> {
        &self.problem
    }

    /// Set once termination has been requested. Long-running solvers should
    /// poll this and return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn log(&mut self, level: u8, message: impl Into<String>) -> bool {
        self.emitter.log(level, message)
    }

    pub fn log_with(
        &mut self,
        level: u8,
        message: impl Into<String>,
        timeout: Duration,
        force: bool,
    ) -> bool {
        self.emitter.log_with(level, message, timeout, force)
    }

    pub fn viz(&mut self, payload: Value) -> bool {
        self.emitter.viz(payload)
    }

    pub fn viz_with(&mut self, payload: Value, timeout: Duration, force: bool) -> bool {
        self.emitter.viz_with(payload, timeout, force)
    }

    pub fn msr(&mut self, measurement: Measurement) -> bool {
        self.emitter.msr(measurement)
    }

    pub fn msr_with(&mut self, measurement: Measurement, timeout: Duration, force: bool) -> bool {
        self.emitter.msr_with(measurement, timeout, force)
    }
}
