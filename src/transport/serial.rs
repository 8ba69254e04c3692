//! Serial-backed transport and port discovery (spec §6), grounded on
//! `controller/send_and_listen.py`'s `_resolve_port`/`_list_candidate_ports`.

use std::io::{Read, Write};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, warn};

use crate::error::{MeshError, Result};

use super::{Inbound, Transport};

/// Candidate device names preferred over generic ones, matching the
/// original's `usbmodem|usbserial|ttyACM|ttyUSB` pattern.
const PREFERRED_SUBSTRINGS: &[&str] = &["usbmodem", "usbserial", "ttyacm", "ttyusb"];

/// Frames are written/read as a 4-byte big-endian length prefix followed by
/// UTF-8 bytes — the physical link is a byte stream, not a framed one, and
/// frame bodies legitimately contain embedded newlines (spec §4.2's
/// multi-line `Output:` blocks), so a length prefix is used rather than a
/// line delimiter.
fn encode_frame(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Picks the first serial port matching [`PREFERRED_SUBSTRINGS`], or the
/// first port at all if none match, polling every `poll_interval` up to
/// `wait` before giving up.
pub async fn discover_port(wait: Duration, poll_interval: Duration) -> Result<String> {
    let deadline = Instant::now() + wait;
    loop {
        let ports = task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| MeshError::PortDiscovery {
                message: format!("port enumeration task failed: {e}"),
            })?
            .map_err(|e| MeshError::PortDiscovery {
                message: format!("failed to list serial ports: {e}"),
            })?;

        let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
        if let Some(port) = pick_preferred(&names) {
            return Ok(port);
        }

        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    Err(MeshError::PortDiscovery {
        message: "no serial devices detected; pass --port explicitly".to_string(),
    })
}

fn pick_preferred(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    for (name, lower) in names.iter().zip(&lowered) {
        if PREFERRED_SUBSTRINGS.iter().any(|needle| lower.contains(needle)) {
            return Some(name.clone());
        }
    }
    names.first().cloned()
}

/// A [`Transport`] backed by a real serial port.
///
/// Reading happens on a dedicated blocking thread (the `serialport` crate
/// is synchronous) that forwards decoded frames over an unbounded channel;
/// writes are dispatched through `spawn_blocking` against a shared port
/// handle.
pub struct SerialTransport {
    port: std::sync::Arc<StdMutex<Box<dyn serialport::SerialPort>>>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
}

impl SerialTransport {
    /// Opens `path` at `baud` and starts the background reader.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| MeshError::Transport {
                message: format!("failed to open {path}: {e}"),
            })?;

        let port = std::sync::Arc::new(StdMutex::new(port));
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_reader(std::sync::Arc::clone(&port), tx);

        Ok(Self {
            port,
            inbox: tokio::sync::Mutex::new(rx),
        })
    }
}

fn spawn_reader(
    port: std::sync::Arc<StdMutex<Box<dyn serialport::SerialPort>>>,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    std::thread::spawn(move || loop {
        let frame = {
            let Ok(mut guard) = port.lock() else {
                break;
            };
            read_frame(guard.as_mut())
        };

        match frame {
            Ok(Some(text)) => {
                if tx
                    .send(Inbound {
                        text,
                        from_id: None,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "serial read failed");
                break;
            }
        }
    });
}

/// Reads one length-prefixed frame, or `Ok(None)` on a read timeout with
/// nothing pending (the normal idle case for a blocking serial handle).
fn read_frame(port: &mut dyn serialport::SerialPort) -> std::io::Result<Option<String>> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = port.read_exact(&mut len_buf) {
        if e.kind() == std::io::ErrorKind::TimedOut {
            return Ok(None);
        }
        return Err(e);
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    port.read_exact(&mut payload)?;
    Ok(Some(String::from_utf8_lossy(&payload).into_owned()))
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&self, text: &str, destination: Option<&str>) {
        let frame = encode_frame(text);
        let port = std::sync::Arc::clone(&self.port);
        let result = task::spawn_blocking(move || {
            let mut guard = port.lock().map_err(|_| "poisoned serial mutex".to_string())?;
            guard
                .write_all(&frame)
                .map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(to = ?destination, "sent frame"),
            Ok(Err(e)) => warn!(error = %e, "failed to write frame"),
            Err(e) => warn!(error = %e, "serial write task panicked"),
        }
    }

    async fn recv(&self) -> Option<Inbound> {
        self.inbox.lock().await.recv().await
    }
}
