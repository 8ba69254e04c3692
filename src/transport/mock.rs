//! An in-memory transport used by tests and by the integration suite to
//! wire an agent and a controller together without a real radio.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{Inbound, Transport};

/// One end of an in-memory pair. `send` pushes onto the peer's queue;
/// `recv` pulls from this end's own queue.
pub struct MockTransport {
    outbox: mpsc::UnboundedSender<Inbound>,
    inbox: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    self_id: String,
}

impl MockTransport {
    /// Builds a connected pair: frames sent on `a` are received on `b` and
    /// vice versa, each tagged with the sender's id.
    #[must_use]
    pub fn pair(a_id: impl Into<String>, b_id: impl Into<String>) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a_id = a_id.into();
        let b_id = b_id.into();
        let a = Self {
            outbox: b_tx,
            inbox: Mutex::new(a_rx),
            self_id: a_id,
        };
        let b = Self {
            outbox: a_tx,
            inbox: Mutex::new(b_rx),
            self_id: b_id,
        };
        (a, b)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, text: &str, _destination: Option<&str>) {
        let _ = self.outbox.send(Inbound {
            text: text.to_string(),
            from_id: Some(self.self_id.clone()),
        });
    }

    async fn recv(&self) -> Option<Inbound> {
        self.inbox.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_in_both_directions() {
        let (agent, controller) = MockTransport::pair("agent", "controller");
        agent.send("hello", None).await;
        let at_controller = controller.recv().await.unwrap_or_else(|| unreachable!());
        assert_eq!(at_controller.text, "hello");
        assert_eq!(at_controller.from_id.as_deref(), Some("agent"));

        controller.send("world", None).await;
        let at_agent = agent.recv().await.unwrap_or_else(|| unreachable!());
        assert_eq!(at_agent.text, "world");
    }
}
