//! Per-session run lifecycle.
//!
//! A [`RunController`] allows at most one active run. Starting a run builds
//! the problem and algorithm through the [`Registry`], starts a [`Worker`]
//! and spawns a [`Forwarder`] task that relays its output to the session.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use mlb_solver::{EmitterConfig, Worker};
use mlb_types::{MlbError, MlbResult, OutboundMessage, RunError, RunOutcome, RunRequest};

use crate::forwarder::{ForwardStats, Forwarder};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
}

/// What is known about a run once its forwarder has finished.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: Option<RunOutcome>,
    pub stats: ForwardStats,
}

struct ActiveRun {
    id: Uuid,
    worker: Arc<Worker>,
    forwarder: JoinHandle<ForwardStats>,
}

pub struct RunController {
    registry: Arc<Registry>,
    emitter: EmitterConfig,
    poll_interval: Duration,
    outbound: mpsc::Sender<OutboundMessage>,
    active: Option<ActiveRun>,
}

impl RunController {
    pub fn new(
        registry: Arc<Registry>,
        emitter: EmitterConfig,
        poll_interval: Duration,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        Self {
            registry,
            emitter,
            poll_interval,
            outbound,
            active: None,
        }
    }

    /// `Running` until the forwarder of the current run has finished.
    pub fn state(&self) -> RunState {
        match &self.active {
            Some(run) if !run.forwarder.is_finished() => RunState::Running,
            _ => RunState::Idle,
        }
    }

    /// Id of the run currently in progress.
    pub fn active_run(&self) -> Option<Uuid> {
        match self.state() {
            RunState::Running => self.active.as_ref().map(|run| run.id),
            RunState::Idle => None,
        }
    }

    pub fn catalog(&self) -> serde_json::Value {
        self.registry.catalog()
    }

    /// Start a run. Rejected while another run is in progress; a request
    /// that fails to configure never starts a worker.
    pub fn run(&mut self, request: RunRequest) -> MlbResult<Uuid> {
        if self.state() == RunState::Running {
            return Err(RunError::ConcurrentRun.into());
        }

        let problem = self.registry.build_problem(&request.problem)?;
        let algorithm = self
            .registry
            .build_solver(&request.solver, &request.problem, Arc::clone(&problem))?;

        let run_id = Uuid::new_v4();
        let name = if request.solver.name.is_empty() {
            request.solver.implementation.clone()
        } else {
            request.solver.name.clone()
        };
        let worker = Arc::new(Worker::new(name, problem, algorithm, self.emitter.clone()));
        let outputs = worker
            .take_outputs()
            .ok_or_else(|| MlbError::Internal("worker outputs already taken".into()))?;
        worker.start()?;

        let forwarder = Forwarder::new(run_id, Arc::clone(&worker), outputs, self.poll_interval);
        let handle = tokio::spawn(forwarder.run(self.outbound.clone()));

        info!(
            run_id = %run_id,
            solver = %request.solver.implementation,
            problem = %request.problem.implementation,
            "Run started"
        );
        self.active = Some(ActiveRun {
            id: run_id,
            worker,
            forwarder: handle,
        });
        Ok(run_id)
    }

    /// Ask the active worker to stop. The forwarder still drains whatever
    /// the worker emitted before it noticed.
    pub fn kill(&mut self) {
        match &self.active {
            Some(run) if self.state() == RunState::Running => {
                info!(run_id = %run.id, "Killing run");
                run.worker.terminate();
            }
            _ => warn!("Kill requested but no solver is running"),
        }
    }

    /// Wait for the active run's forwarder to finish.
    pub async fn wait(&mut self) -> Option<RunSummary> {
        let run = self.active.take()?;
        let stats = match run.forwarder.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "Forwarder task failed");
                ForwardStats::default()
            }
        };
        Some(RunSummary {
            run_id: run.id,
            outcome: run.worker.outcome(),
            stats,
        })
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.worker.terminate();
        }
    }
}
