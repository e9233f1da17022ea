//! Messages produced by a running solver and relayed to observers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scope::Candidate;

/// Highest log level; used for significant events.
pub const MAX_LOG_LEVEL: u8 = 10;

/// Measurement key holding the wall-clock timestamp (UNIX seconds).
pub const TIME_KEY: &str = "_time";

/// Measurement key holding the seconds elapsed since the previous measurement.
pub const STEP_DURATION_KEY: &str = "_stepDuration";

/// The three output streams of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Log,
    Viz,
    Measure,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Log, Stream::Viz, Stream::Measure];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Viz => "viz",
            Self::Measure => "measure",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Human-readable progress line. `level` ranges over 0..=10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: u8,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: u8, message: impl Into<String>) -> Self {
        Self {
            level: level.min(MAX_LOG_LEVEL),
            message: message.into(),
        }
    }
}

/// Periodic structured snapshot of solver progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Measurement(Map<String, Value>);

impl Measurement {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wall-clock time of this measurement, if stamped.
    pub fn time(&self) -> Option<f64> {
        self.get(TIME_KEY).and_then(Value::as_f64)
    }

    /// Seconds since the previous measurement, if stamped.
    pub fn step_duration(&self) -> Option<f64> {
        self.get(STEP_DURATION_KEY).and_then(Value::as_f64)
    }

    /// Stamp `_time` with the current time and `_stepDuration` with the given
    /// elapsed seconds.
    pub fn stamp(&mut self, step_duration: f64) {
        let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        self.insert(TIME_KEY, now);
        self.insert(STEP_DURATION_KEY, step_duration);
    }
}

/// Terminal outcome of a successful run: the best candidate and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    #[serde(rename = "solution")]
    pub candidate: Candidate,
    pub evaluation: f64,
}

impl Solution {
    pub fn new(candidate: Candidate, evaluation: f64) -> Self {
        Self {
            candidate,
            evaluation,
        }
    }
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Solved(Solution),
    Cancelled,
    Faulted(String),
}

impl RunOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Solved(solution) => Some(solution),
            _ => None,
        }
    }
}

/// One JSON document written to an observer connection, e.g. `{"log": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundMessage {
    Log(LogMessage),
    Viz(Value),
    Measure(Measurement),
    Error(String),
    Catalog(Value),
}

impl OutboundMessage {
    /// The worker stream this message was relayed from, if any.
    pub fn stream(&self) -> Option<Stream> {
        match self {
            Self::Log(_) => Some(Stream::Log),
            Self::Viz(_) => Some(Stream::Viz),
            Self::Measure(_) => Some(Stream::Measure),
            Self::Error(_) | Self::Catalog(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_messages_are_tagged_by_stream() {
        let log = OutboundMessage::Log(LogMessage::new(3, "hello"));
        assert_eq!(
            serde_json::to_value(&log).unwrap(),
            json!({"log": {"level": 3, "message": "hello"}})
        );

        let viz = OutboundMessage::Viz(json!({"current": null}));
        assert_eq!(serde_json::to_value(&viz).unwrap(), json!({"viz": {"current": null}}));

        let err = OutboundMessage::Error("busy".into());
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "busy"}));
        assert_eq!(err.stream(), None);
    }

    #[test]
    fn log_level_is_clamped() {
        assert_eq!(LogMessage::new(42, "x").level, MAX_LOG_LEVEL);
    }

    #[test]
    fn measurement_stamp_sets_reserved_keys() {
        let mut m = Measurement::new().with("evaluations", 4);
        m.stamp(0.25);
        assert_eq!(m.step_duration(), Some(0.25));
        assert!(m.time().unwrap() > 1_600_000_000.0);
        assert_eq!(m.get("evaluations"), Some(&json!(4)));

        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("_time").is_some());
        assert_eq!(json["_stepDuration"], json!(0.25));
    }

    #[test]
    fn solution_uses_observer_field_names() {
        let solution = Solution::new(Candidate::from(vec![1, 0]), 5.0);
        assert_eq!(
            serde_json::to_value(&solution).unwrap(),
            json!({"solution": [1, 0], "evaluation": 5.0})
        );
    }
}
