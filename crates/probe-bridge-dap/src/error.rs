//! DAP error types.

use probe_bridge_config::ConfigError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors from DAP bridge operations.
#[derive(Debug, Error)]
pub enum DapError {
    /// Backend unreachable, failed to spawn, or the stream closed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed frame header or truncated frame.
    #[error("framing error: {0}")]
    Framing(String),

    /// Well-framed data that is not the message we expected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session ended before the request could complete.
    #[error("session terminated")]
    SessionTerminated,

    /// A request was submitted after the session terminated.
    #[error("session is not connected")]
    NotConnected,

    /// Backend answered with `success: false`.
    #[error("adapter rejected {command}: {message}")]
    Rejected {
        /// The command that failed.
        command: String,
        /// The rejection message from the adapter.
        message: String,
    },

    /// No response arrived in time; the session has been torn down.
    #[error("request timed out: {command}")]
    Timeout {
        /// The command that timed out.
        command: String,
    },

    /// The host asked for something the current state does not allow.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// The host operation.
        operation: String,
        /// State at the time of the call.
        state: SessionState,
    },

    /// Debug configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DapError {
    /// Whether this error ends the session when the transport reports it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DapError::Connection(_) | DapError::Framing(_))
    }
}
