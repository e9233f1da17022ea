//! # mlb-server
//!
//! Session layer of MLBench: TCP sessions, the per-session run controller,
//! the stream forwarder and the registry of available implementations.

pub mod config;
pub mod controller;
pub mod forwarder;
pub mod registry;
pub mod server;
pub mod session;

pub use config::{LoggingConfig, ServerConfig};
pub use controller::{RunController, RunState, RunSummary};
pub use forwarder::{ForwardStats, Forwarder};
pub use registry::Registry;
pub use server::Server;
pub use session::{serve_connection, Command, SessionSettings};
