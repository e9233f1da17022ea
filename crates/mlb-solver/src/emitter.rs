//! Rate-limited output channels of a worker.
//!
//! A worker owns one [`Emitter`] that writes to three unbounded channels:
//! `log`, `viz` and `measure`. Each channel remembers when it last sent and
//! drops non-forced messages that arrive within its timeout. The consumer
//! side is handed out as [`WorkerOutputs`].

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mlb_types::{ConfigurationError, LogMessage, Measurement};

/// Text of the log line emitted once when log messages start being dropped.
pub const SUPPRESSED_MESSAGE: &str = "further messages suppressed";

/// Default per-channel timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub log_timeout_secs: f64,
    pub viz_timeout_secs: f64,
    pub measure_timeout_secs: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            log_timeout_secs: 0.1,
            viz_timeout_secs: 0.1,
            measure_timeout_secs: 1.0,
        }
    }
}

impl EmitterConfig {
    pub fn log_timeout(&self) -> Duration {
        seconds(self.log_timeout_secs)
    }

    pub fn viz_timeout(&self) -> Duration {
        seconds(self.viz_timeout_secs)
    }

    pub fn measure_timeout(&self) -> Duration {
        seconds(self.measure_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (key, value) in [
            ("log_timeout_secs", self.log_timeout_secs),
            ("viz_timeout_secs", self.viz_timeout_secs),
            ("measure_timeout_secs", self.measure_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::InvalidConfig {
                    message: format!("emitter.{key} must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Last-send bookkeeping of one channel.
#[derive(Debug, Default)]
struct Throttle {
    last_sent: Option<Instant>,
}

impl Throttle {
    fn admit(&mut self, timeout: Duration, force: bool) -> bool {
        let now = Instant::now();
        let admitted = force
            || self
                .last_sent
                .map_or(true, |last| now.duration_since(last) > timeout);
        if admitted {
            self.last_sent = Some(now);
        }
        admitted
    }
}

/// Worker-side writer for the three output channels.
pub struct Emitter {
    config: EmitterConfig,
    log_tx: Sender<LogMessage>,
    viz_tx: Sender<Value>,
    measure_tx: Sender<Measurement>,
    log_throttle: Throttle,
    viz_throttle: Throttle,
    measure_throttle: Throttle,
    log_suppressed: bool,
}

impl Emitter {
    /// Create an emitter together with the receiving ends of its channels.
    pub fn channel(config: EmitterConfig) -> (Emitter, WorkerOutputs) {
        let (log_tx, log) = unbounded();
        let (viz_tx, viz) = unbounded();
        let (measure_tx, measure) = unbounded();
        let emitter = Emitter {
            config,
            log_tx,
            viz_tx,
            measure_tx,
            log_throttle: Throttle::default(),
            viz_throttle: Throttle::default(),
            measure_throttle: Throttle::default(),
            log_suppressed: false,
        };
        (emitter, WorkerOutputs { log, viz, measure })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn log(&mut self, level: u8, message: impl Into<String>) -> bool {
        let timeout = self.config.log_timeout();
        self.log_with(level, message, timeout, false)
    }

    /// Send a log line unless the previous one went out less than `timeout`
    /// ago. The first dropped line after a send is replaced by a single
    /// level-0 placeholder.
    pub fn log_with(
        &mut self,
        level: u8,
        message: impl Into<String>,
        timeout: Duration,
        force: bool,
    ) -> bool {
        if self.log_throttle.admit(timeout, force) {
            self.log_suppressed = false;
            let _ = self.log_tx.send(LogMessage::new(level, message));
            return true;
        }
        if !self.log_suppressed {
            self.log_suppressed = true;
            let _ = self.log_tx.send(LogMessage::new(0, SUPPRESSED_MESSAGE));
        }
        false
    }

    pub fn viz(&mut self, payload: Value) -> bool {
        let timeout = self.config.viz_timeout();
        self.viz_with(payload, timeout, false)
    }

    pub fn viz_with(&mut self, payload: Value, timeout: Duration, force: bool) -> bool {
        if !self.viz_throttle.admit(timeout, force) {
            return false;
        }
        let _ = self.viz_tx.send(payload);
        true
    }

    pub fn msr(&mut self, measurement: Measurement) -> bool {
        let timeout = self.config.measure_timeout();
        self.msr_with(measurement, timeout, false)
    }

    pub fn msr_with(&mut self, measurement: Measurement, timeout: Duration, force: bool) -> bool {
        if !self.measure_throttle.admit(timeout, force) {
            return false;
        }
        let _ = self.measure_tx.send(measurement);
        true
    }
}

/// Consumer side of a worker's channels.
pub struct WorkerOutputs {
    pub log: Receiver<LogMessage>,
    pub viz: Receiver<Value>,
    pub measure: Receiver<Measurement>,
}

impl WorkerOutputs {
    /// Whether any of the three channels holds an unread message.
    pub fn has_pending(&self) -> bool {
        !self.log.is_empty() || !self.viz.is_empty() || !self.measure.is_empty()
    }
}
