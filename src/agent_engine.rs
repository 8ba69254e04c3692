//! Agent-side dispatch state machine (spec §4.6): classify, page,
//! execute-and-chunk, command-lock serialization.
//!
//! Grounded on `original_source/app/agent.py`'s `_on_receive`/`_handle_more`/
//! `_execute_and_respond`, restructured around a `tokio::sync::mpsc` inbound
//! channel and a `tokio::sync::Mutex` command lock per spec.md §9's "no
//! global bus is required" recommendation.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::session::SessionTable;
use crate::shell;
use crate::store::OutputStore;
use crate::transport::{Inbound, Transport};
use crate::wire::frame::{self, Frame};
use crate::wire::{chunk_output, DEFAULT_MAX_PAYLOAD};

/// How long the agent waits after sending an Ack before storing chunks, so
/// the controller has latched the command id before paging begins.
const POST_ACK_GRACE: Duration = Duration::from_millis(100);

/// Agent-side engine: owns the command lock, session table, and output
/// store, and dispatches inbound frames against a [`Transport`].
pub struct AgentEngine<T: Transport> {
    transport: Arc<T>,
    sessions: SessionTable,
    store: OutputStore,
    command_lock: Mutex<()>,
    timeout: Duration,
    max_payload: usize,
    hostname: String,
}

impl<T: Transport> AgentEngine<T> {
    /// Builds an engine bound to `transport`, with command execution capped
    /// at `timeout` and replies chunked to `max_payload` bytes.
    #[must_use]
    pub fn new(transport: Arc<T>, timeout: Duration, max_payload: usize) -> Self {
        Self {
            transport,
            sessions: SessionTable::new(),
            store: OutputStore::new(),
            command_lock: Mutex::new(()),
            timeout,
            max_payload: if max_payload == 0 {
                DEFAULT_MAX_PAYLOAD
            } else {
                max_payload
            },
            hostname: hostname(),
        }
    }

    /// Runs the dispatch loop until the transport is closed.
    pub async fn run(self: Arc<Self>) {
        loop {
            let Some(inbound) = self.transport.recv().await else {
                info!("transport closed, agent engine stopping");
                return;
            };
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                engine.dispatch(inbound).await;
            });
        }
    }

    #[instrument(skip(self, inbound), fields(from = ?inbound.from_id))]
    async fn dispatch(&self, inbound: Inbound) {
        match frame::parse(&inbound.text) {
            Frame::Empty | Frame::Echo => {}
            Frame::Paging { id, index } => self.handle_paging(&id, index, inbound.from_id.as_deref()).await,
            Frame::Command(command) => {
                self.handle_command(&command, inbound.from_id.as_deref()).await;
            }
            Frame::Reply(_) => {}
        }
    }

    async fn handle_paging(&self, id: &str, index: usize, destination: Option<&str>) {
        let (chunk, n) = self.store.get(id, index).await;
        match chunk {
            Some(text) => {
                debug!(id, index, n, "serving chunk");
                self.transport.send(&text, destination).await;
                if n == 0 || index >= n.saturating_sub(1) {
                    self.store.finalize(id).await;
                }
            }
            None => {
                debug!(id, index, n, "no chunk at index, sending no-more");
                self.transport.send(&frame::serialize_no_more(id), destination).await;
                if n == 0 || index >= n.saturating_sub(1).max(0) {
                    self.store.finalize(id).await;
                }
            }
        }
    }

    async fn handle_command(&self, command: &str, destination: Option<&str>) {
        let received_at = Instant::now();
        let _guard = self.command_lock.lock().await;

        let id = next_command_id();
        let sender = destination.unwrap_or("").to_string();

        let session_result = self.sessions.handle(&sender, command).await;
        let (stdout, stderr, _exit_code, exec_start, exec_done) = match session_result {
            Some((stdout, stderr, exit_code)) => {
                // Session subcommands (`cd`, `session ...`) are synthesized
                // locally, with no process to time — both timestamps
                // collapse to "now" so the Timing line reads ~0s.
                let now = Instant::now();
                (stdout, stderr, exit_code, now, now)
            }
            None => {
                let cwd = self.sessions.cwd(&sender).await;
                let exec_start = Instant::now();
                let result = shell::run(command, Some(&cwd), self.timeout).await;
                let exec_done = Instant::now();
                (result.stdout, result.stderr, result.exit_code, exec_start, exec_done)
            }
        };

        let blob = shell::format_blob(&stdout, &stderr, received_at, exec_start, exec_done);
        let chunks = chunk_output(&id, &blob, self.max_payload);

        match chunks.as_slice() {
            [] => {
                let fallback = format!("MSG-ID:{id}\nOutput:\n<no output>");
                self.transport.send(&fallback, destination).await;
            }
            [only] => {
                self.transport.send(only, destination).await;
            }
            _ => {
                let ack = frame::serialize_ack(&id, &self.hostname, command);
                self.transport.send(&ack, destination).await;
                tokio::time::sleep(POST_ACK_GRACE).await;
                self.store.store(&id, chunks).await;
            }
        }
    }
}

fn next_command_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    millis.to_string()
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "agent".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn engine_pair(max_payload: usize) -> (Arc<AgentEngine<MockTransport>>, MockTransport) {
        let (agent_side, controller_side) = MockTransport::pair("agent", "controller");
        let engine = Arc::new(AgentEngine::new(
            Arc::new(agent_side),
            Duration::from_secs(5),
            max_payload,
        ));
        (engine, controller_side)
    }

    #[tokio::test]
    async fn short_command_yields_a_single_chunk_reply() {
        let (engine, controller) = engine_pair(DEFAULT_MAX_PAYLOAD);
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        controller.send("echo hi", None).await;
        let reply = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert!(reply.text.starts_with("MSG-ID:"));
        assert!(reply.text.contains("CHUNK:0/1"));
        assert!(reply.text.contains("hi"));
        assert!(reply.text.ends_with("Done"));

        run_handle.abort();
    }

    #[tokio::test]
    async fn multi_chunk_command_sends_ack_then_stores_and_waits_for_paging() {
        let (engine, controller) = engine_pair(40);
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        controller.send("echo this-is-a-somewhat-longer-output-line", None).await;
        let ack = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert!(ack.text.contains("Cmd received:"));

        let id = ack.text.lines().next().unwrap_or_else(|| unreachable!());
        let id = id.trim_start_matches("MSG-ID:").to_string();

        controller.send(&format!("more {id} 0"), None).await;
        let chunk0 = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert!(chunk0.text.contains("CHUNK:0/"));

        run_handle.abort();
    }

    #[tokio::test]
    async fn paging_unknown_id_returns_no_more_frame() {
        let (engine, controller) = engine_pair(DEFAULT_MAX_PAYLOAD);
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        controller.send("more nonexistent 0", None).await;
        let reply = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert_eq!(reply.text, "MSG-ID:nonexistent\nDone");

        run_handle.abort();
    }

    #[tokio::test]
    async fn session_cd_is_handled_without_invoking_the_shell() {
        let (engine, controller) = engine_pair(DEFAULT_MAX_PAYLOAD);
        let run_handle = tokio::spawn(Arc::clone(&engine).run());

        controller.send("cd /tmp", Some("alice")).await;
        let reply = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert!(reply.text.contains("CWD:/tmp") || reply.text.contains("CWD:/private/tmp"));

        run_handle.abort();
    }
}
