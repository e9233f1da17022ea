//! # mlb-solver
//!
//! Execution core of MLBench: the [`Worker`] that runs one solver on its own
//! thread, the rate-limited [`Emitter`] it reports through, and the built-in
//! optimizers.

pub mod algorithm;
pub mod context;
pub mod emitter;
pub mod optimizers;
pub mod worker;

pub use algorithm::{Algorithm, MonolithicSolver, Step, StepSolver};
pub use context::SolverContext;
pub use emitter::{Emitter, EmitterConfig, WorkerOutputs, SUPPRESSED_MESSAGE};
pub use worker::Worker;
