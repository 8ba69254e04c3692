//! Transport contract (spec §6): a bidirectional channel delivering UTF-8
//! text frames of bounded size, with an optional destination identifier.
//!
//! The radio link itself, device discovery, and serial-port selection are
//! out of scope for the protocol engines (spec §1) — they are external
//! collaborators whose contract is captured by the [`Transport`] trait.

mod mock;
mod serial;

use async_trait::async_trait;

pub use mock::MockTransport;
pub use serial::{discover_port, SerialTransport};

/// An inbound frame as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// The frame text.
    pub text: String,
    /// The sender's id, if the transport can report one.
    pub from_id: Option<String>,
}

/// The transport contract consumed by both engines.
///
/// Implementations are expected to scope frames to a single channel index
/// and to silently drop frames on any port other than the text-message
/// port (spec §6) — that filtering is the transport's job, not the
/// engines'.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `text` as a single frame, optionally addressed to
    /// `destination`. Implementations should log and swallow failures
    /// (spec §7) rather than propagate them to the caller, since the
    /// pull-based protocol already tolerates lost sends.
    async fn send(&self, text: &str, destination: Option<&str>);

    /// Receives the next inbound frame, or `None` if the transport has
    /// been closed.
    async fn recv(&self) -> Option<Inbound>;
}
