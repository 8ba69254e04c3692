//! `meshc2` — a command-and-control bridge over a low-bandwidth, lossy
//! mesh-radio transport.
//!
//! An agent receives shell commands over the radio, executes them, and
//! returns the output through a small chunked application-layer protocol
//! (framing, acknowledgement, paged retrieval, retry with backoff). A
//! controller sends the command and reassembles the reply. See
//! [`agent_engine`] and [`controller_engine`] for the two halves of the
//! protocol; [`wire`] defines the frames they exchange.

pub mod agent_engine;
pub mod cli;
pub mod clock;
pub mod config;
pub mod controller_engine;
pub mod error;
pub mod session;
pub mod shell;
pub mod store;
pub mod transport;
pub mod wire;

pub use error::{MeshError, Result};
