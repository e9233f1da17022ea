//! One observer connection: newline-delimited JSON in both directions.
//!
//! Inbound lines are [`Command`]s. Outbound lines are [`OutboundMessage`]s,
//! written by a dedicated task so that slow observers never hold up the
//! reader, and the reader never waits on a worker. Replies to commands go
//! through their own unbounded queue: a run that fills the relay queue must
//! not keep the reader from accepting `kill`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mlb_solver::EmitterConfig;
use mlb_types::{MlbResult, OutboundMessage, RunRequest};

use crate::controller::{RunController, RunState, RunSummary};
use crate::registry::Registry;

/// Capacity of the queue of relayed worker output of one session.
const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Command {
    Run(RunRequest),
    Kill,
    Catalog,
}

/// Settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub registry: Arc<Registry>,
    pub emitter: EmitterConfig,
    pub poll_interval: Duration,
}

/// Serve one connection until the peer closes it. Any active run is killed
/// on the way out, and this returns only once its worker has ended. The
/// summary is that of the last run started on the connection, if any.
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    settings: SessionSettings,
) -> MlbResult<Option<RunSummary>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_messages(writer, reply_rx, rx));

    let mut controller = RunController::new(
        settings.registry,
        settings.emitter,
        settings.poll_interval,
        tx.clone(),
    );

    let mut lines = BufReader::new(reader).lines();
    let result: MlbResult<()> = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle(&mut controller, command),
            Err(err) => {
                debug!(error = %err, "Malformed command");
                Some(OutboundMessage::Error(format!("invalid command: {err}")))
            }
        };
        if let Some(reply) = reply {
            if reply_tx.send(reply).is_err() {
                break Ok(());
            }
        }
    };

    if controller.state() == RunState::Running {
        controller.kill();
    }
    let summary = controller.wait().await;
    drop(controller);
    drop(tx);
    drop(reply_tx);
    if let Err(err) = writer_task.await {
        warn!(error = %err, "Session writer failed");
    }
    info!(run_id = ?summary.as_ref().map(|s| s.run_id), "Session closed");
    result.map(|()| summary)
}

fn handle(controller: &mut RunController, command: Command) -> Option<OutboundMessage> {
    match command {
        Command::Run(request) => match controller.run(request) {
            Ok(run_id) => {
                debug!(run_id = %run_id, "Run accepted");
                None
            }
            Err(err) => {
                warn!(error = %err, "Run rejected");
                Some(OutboundMessage::Error(err.to_string()))
            }
        },
        Command::Kill => {
            controller.kill();
            None
        }
        Command::Catalog => Some(OutboundMessage::Catalog(controller.catalog())),
    }
}

async fn write_messages<W>(
    mut writer: W,
    mut replies: mpsc::UnboundedReceiver<OutboundMessage>,
    mut relayed: mpsc::Receiver<OutboundMessage>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            Some(message) = replies.recv() => message,
            Some(message) = relayed.recv() => message,
            else => break,
        };
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Dropping unserializable message");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(err) = writer.write_all(&line).await {
            debug!(error = %err, "Observer write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}
