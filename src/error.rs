//! Error types for `meshc2`.
//!
//! Most protocol failures (malformed frames, shell timeouts, `cd` to a
//! missing directory, paging past the end of a reply) are reduced to wire
//! frames or local non-zero exit codes, not exceptions — see spec §7.
//! [`MeshError`] only covers the genuine system-boundary failures that are
//! allowed to propagate: opening or writing to the transport, failing to
//! discover a serial device, and invalid configuration.

use thiserror::Error;

/// Top-level error type for `meshc2`.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The transport failed to open or a send call failed.
    ///
    /// Send failures are logged and swallowed by the engines (the
    /// pull-based protocol lets the controller re-request), so this
    /// variant is constructed for `tracing` context, not propagated to a
    /// caller expecting protocol continuation.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable description of the failure.
        message: String,
    },

    /// No serial device was found within `port_wait`.
    #[error("no serial device found: {message}")]
    PortDiscovery {
        /// Human-readable description of the failure.
        message: String,
    },

    /// A configuration value was invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MeshError>;
