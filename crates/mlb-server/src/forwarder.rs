//! Relays a worker's output streams to an observer.
//!
//! The forwarder polls the three channels without ever blocking on them. It
//! keeps going while the worker is alive or anything is left to read, so
//! messages emitted right before the worker ended are still delivered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use mlb_solver::{Worker, WorkerOutputs};
use mlb_types::{OutboundMessage, Stream};

/// Diagnostic counters of one forwarding session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForwardStats {
    pub iterations: u64,
    pub elapsed_secs: f64,
    pub log: u64,
    pub viz: u64,
    pub measure: u64,
    /// The observer went away before the worker finished.
    pub sink_closed: bool,
}

impl ForwardStats {
    fn record(&mut self, stream: Stream) {
        match stream {
            Stream::Log => self.log += 1,
            Stream::Viz => self.viz += 1,
            Stream::Measure => self.measure += 1,
        }
    }

    pub fn relayed(&self) -> u64 {
        self.log + self.viz + self.measure
    }
}

pub struct Forwarder {
    run_id: Uuid,
    worker: Arc<Worker>,
    outputs: WorkerOutputs,
    poll_interval: Duration,
}

impl Forwarder {
    pub fn new(
        run_id: Uuid,
        worker: Arc<Worker>,
        outputs: WorkerOutputs,
        poll_interval: Duration,
    ) -> Self {
        Self {
            run_id,
            worker,
            outputs,
            poll_interval,
        }
    }

    fn next_message(&self, stream: Stream) -> Option<OutboundMessage> {
        match stream {
            Stream::Log => self.outputs.log.try_recv().ok().map(OutboundMessage::Log),
            Stream::Viz => self.outputs.viz.try_recv().ok().map(OutboundMessage::Viz),
            Stream::Measure => self
                .outputs
                .measure
                .try_recv()
                .ok()
                .map(OutboundMessage::Measure),
        }
    }

    /// Forward until the worker has ended and its channels are drained. If
    /// `sink` closes first the worker is terminated and whatever it still
    /// emits is discarded, so this never returns before the worker is gone.
    pub async fn run(self, sink: mpsc::Sender<OutboundMessage>) -> ForwardStats {
        let started = Instant::now();
        let mut stats = ForwardStats::default();

        while self.worker.is_alive() || self.outputs.has_pending() {
            stats.iterations += 1;
            let mut relayed = false;

            for stream in Stream::ALL {
                let Some(message) = self.next_message(stream) else {
                    continue;
                };
                relayed = true;
                if stats.sink_closed {
                    continue;
                }
                if sink.send(message).await.is_err() {
                    warn!(run_id = %self.run_id, worker = %self.worker.name(), "Observer gone, terminating worker");
                    self.worker.terminate();
                    stats.sink_closed = true;
                    continue;
                }
                stats.record(stream);
                tokio::task::yield_now().await;
            }

            if !relayed {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        stats.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            run_id = %self.run_id,
            worker = %self.worker.name(),
            iterations = stats.iterations,
            elapsed_secs = stats.elapsed_secs,
            log = stats.log,
            viz = stats.viz,
            measure = stats.measure,
            "Forwarder finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mlb_problems::{Circuit, Distance};
    use mlb_solver::{Algorithm, EmitterConfig, SolverContext, Step, StepSolver};
    use mlb_types::{Candidate, Problem, Solution, SolverResult};
    use serde_json::{json, Value};

    /// Sends one forced log and viz per step, finishing after `limit` steps.
    struct Chatter {
        limit: Option<u64>,
        count: u64,
    }

    impl StepSolver for Chatter {
        fn step(&mut self, ctx: &mut SolverContext) -> SolverResult<Step> {
            self.count += 1;
            ctx.log_with(2, format!("{}", self.count), Duration::ZERO, true);
            ctx.viz_with(json!({ "i": self.count }), Duration::ZERO, true);
            if Some(self.count) == self.limit {
                return Ok(Step::Done(Solution::new(Candidate::from(vec![0, 1]), 5.0)));
            }
            Ok(Step::Continue)
        }

        fn describe(&self) -> Value {
            json!({ "implementation": "Chatter" })
        }
    }

    fn start(limit: Option<u64>) -> (Arc<Worker>, Forwarder) {
        let problem: Arc<dyn Problem> = Arc::new(Circuit::new("c", 2, 1, Distance::Cityblock).unwrap());
        let config = EmitterConfig {
            measure_timeout_secs: 1000.0,
            ..EmitterConfig::default()
        };
        let worker = Arc::new(Worker::new(
            "chatter",
            problem,
            Algorithm::Iterative(Box::new(Chatter { limit, count: 0 })),
            config,
        ));
        let outputs = worker.take_outputs().unwrap();
        worker.start().unwrap();
        let forwarder = Forwarder::new(Uuid::new_v4(), Arc::clone(&worker), outputs, Duration::from_millis(5));
        (worker, forwarder)
    }

    #[tokio::test]
    async fn relays_every_message_in_order() {
        let (worker, forwarder) = start(Some(200));
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(forwarder.run(tx));

        let mut received = Vec::new();
        while let Some(message) = rx.recv().await {
            received.push(message);
        }
        let stats = task.await.unwrap();
        assert!(!worker.is_alive());

        let logs: Vec<String> = received
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Log(log) => Some(log.message.clone()),
                _ => None,
            })
            .collect();
        // 200 forced step logs plus the solution line
        assert_eq!(logs.len(), 201);
        let expected: Vec<String> = (1..=200).map(|i| i.to_string()).collect();
        assert_eq!(&logs[..200], &expected[..]);

        let viz = received.iter().filter(|m| m.stream() == Some(Stream::Viz)).count();
        // init, one per step, final
        assert_eq!(viz, 202);
        let measure = received.iter().filter(|m| m.stream() == Some(Stream::Measure)).count();
        assert_eq!(measure, 1);

        assert_eq!(stats.log, 201);
        assert_eq!(stats.viz, 202);
        assert_eq!(stats.relayed(), received.len() as u64);
        assert!(!stats.sink_closed);
    }

    #[tokio::test]
    async fn closed_sink_terminates_the_worker() {
        let (worker, forwarder) = start(None);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let stats = tokio::time::timeout(Duration::from_secs(5), forwarder.run(tx))
            .await
            .unwrap();
        assert!(stats.sink_closed);
        assert_eq!(stats.relayed(), 0);
        assert!(worker.is_terminated());
        assert!(!worker.is_alive());
        assert_eq!(worker.outcome(), Some(mlb_types::RunOutcome::Cancelled));
    }
}
