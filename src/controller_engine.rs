//! Controller-side send/pull/assemble state machine (spec §4.7), grounded
//! nearly line-for-line on `original_source/mesh_tcp.py::send_and_listen`.

use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::transport::Transport;

/// Paging retries are capped; beyond this the controller simply stops
/// asking and lets the deadline expire.
const MAX_ATTEMPTS: u32 = 200;
/// Upper bound on the exponential backoff applied to `more_delay`.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
/// Backoff multiplier applied to the retry delay after each `more` resend.
const BACKOFF_FACTOR: f64 = 1.8;
/// Per-iteration inbound wait is capped at 1s even when more time remains
/// before the deadline, so retry bookkeeping gets a chance to run.
const POLL_CAP: Duration = Duration::from_secs(1);

/// The outcome of a single `send_and_listen` round.
#[derive(Debug, Clone)]
pub struct ControllerResult {
    /// The assembled, de-duplicated output text.
    pub output: String,
    /// Every raw frame observed, in arrival order (diagnostic/CLI use).
    pub raw_messages: Vec<String>,
    /// Whether any output fragment was observed at all.
    pub received: bool,
    /// Wall-clock duration of the whole exchange.
    pub duration: Duration,
}

/// Controller-side engine bound to a [`Transport`].
pub struct ControllerEngine<T: Transport> {
    transport: T,
}

impl<T: Transport> ControllerEngine<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Sends `command` and drives the pull-based assembly loop until
    /// `Done` is observed or `timeout` elapses.
    pub async fn send_and_listen(
        &self,
        command: &str,
        timeout_duration: Duration,
        more_delay: Duration,
    ) -> ControllerResult {
        let start = Instant::now();
        let deadline = start + timeout_duration;

        self.transport.send(command, None).await;

        let mut last_cmd_id: Option<String> = None;
        let mut active_cmd_id: Option<String> = None;
        let mut outputs: Vec<String> = Vec::new();
        let mut raw_messages: Vec<String> = Vec::new();
        let mut output_seen = false;
        let mut ack_seen = false;
        let mut done_seen = false;
        let mut last_more_at = start;
        let mut attempts: u32 = 0;
        let mut next_index: usize = 0;
        let mut awaiting_chunk = false;
        let mut retry_delay = more_delay.max(Duration::from_secs(1));

        while Instant::now() < deadline && !done_seen {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait_for = remaining.min(POLL_CAP);

            match timeout(wait_for, self.transport.recv()).await {
                Err(_elapsed) => {
                    if let Some(id) = &last_cmd_id {
                        if !done_seen
                            && attempts < MAX_ATTEMPTS
                            && Instant::now().saturating_duration_since(last_more_at) >= retry_delay
                            && (output_seen || ack_seen)
                            && !awaiting_chunk
                        {
                            let request = crate::wire::frame::serialize_paging(id, next_index);
                            debug!(attempt = attempts + 1, index = next_index, "requesting chunk");
                            self.transport.send(&request, None).await;
                            last_more_at = Instant::now();
                            attempts += 1;
                            awaiting_chunk = true;
                            retry_delay = retry_delay.mul_f64(BACKOFF_FACTOR).min(MAX_RETRY_DELAY);
                        }
                    }
                    continue;
                }
                Ok(None) => {
                    info!("transport closed during send_and_listen");
                    break;
                }
                Ok(Some(inbound)) => {
                    let text = inbound.text;
                    if text.trim_start().starts_with("more ") {
                        continue;
                    }

                    raw_messages.push(text.clone());

                    let msg_id = extract_msg_id(&text);
                    if let Some(id) = &msg_id {
                        if text.contains("\nDone") || text.trim_end().ends_with("Done") {
                            done_seen = true;
                        }
                        if text.contains("Cmd received") {
                            ack_seen = true;
                            active_cmd_id = Some(id.clone());
                            last_cmd_id = Some(id.clone());
                        }
                    }

                    if let (Some(active), Some(id)) = (&active_cmd_id, &msg_id) {
                        if active != id {
                            continue;
                        }
                    }

                    if let Some(index) = chunk_index(&text) {
                        output_seen = true;
                        awaiting_chunk = false;
                        if index == next_index {
                            next_index += 1;
                        }
                    }

                    if let Some(body) = text.split_once("Output:") {
                        output_seen = true;
                        awaiting_chunk = false;
                        if let Some(fragment) = strip_done_sentinel(body.1.trim_start()) {
                            outputs.push(fragment);
                        }
                    } else if text.starts_with("MSG-ID:") && !text.contains("Cmd received") {
                        // The header (`MSG-ID:` line, and for non-first
                        // chunks the bare `CHUNK:i/n` line) is framing, not
                        // body — strip both so the round-trip law in §8
                        // holds (reassembled output must equal the original
                        // blob, not the blob interleaved with headers).
                        let mut lines: Vec<&str> = text.lines().collect();
                        if !lines.is_empty() {
                            lines.remove(0);
                        }
                        lines.retain(|line| !line.starts_with("CHUNK:"));
                        if matches!(lines.last(), Some(last) if last.trim() == "Done") {
                            lines.pop();
                        }
                        let fragment = lines.join("\n").trim().to_string();
                        if !fragment.is_empty() {
                            output_seen = true;
                            awaiting_chunk = false;
                            outputs.push(fragment);
                        }
                    }
                }
            }
        }

        let mut unique_outputs: Vec<String> = Vec::new();
        for output in outputs {
            if !unique_outputs.contains(&output) {
                unique_outputs.push(output);
            }
        }

        ControllerResult {
            output: unique_outputs.join("\n").trim().to_string(),
            raw_messages,
            received: output_seen,
            duration: Instant::now().saturating_duration_since(start),
        }
    }
}

fn extract_msg_id(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    first_line
        .strip_prefix("MSG-ID:")
        .map(|rest| rest.trim().to_string())
}

fn chunk_index(text: &str) -> Option<usize> {
    let line = text.lines().find(|l| l.starts_with("CHUNK:"))?;
    let rest = line.strip_prefix("CHUNK:")?;
    let index_part = rest.split('/').next()?;
    index_part.parse().ok()
}

/// Strips a trailing `Done` line from an extracted output fragment, then
/// returns it if non-empty.
fn strip_done_sentinel(text: &str) -> Option<String> {
    let mut lines: Vec<&str> = text.lines().collect();
    if matches!(lines.last(), Some(last) if last.trim() == "Done") {
        lines.pop();
    }
    let joined = lines.join("\n").trim_end().to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
