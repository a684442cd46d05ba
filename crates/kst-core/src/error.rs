//! Error types for the session engine.
//!
//! Session errors describe misuse of the state machine (wrong phase) and
//! locally rejected commands. Transport failures never surface here: the
//! driver observes them and reports them as events.

use kst_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionPhase;

/// Errors returned by [`crate::Session`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input not valid for the current phase
    #[error("invalid state transition: cannot {operation} from {phase:?}")]
    InvalidState {
        /// Phase when the input arrived
        phase: SessionPhase,
        /// Operation that was attempted
        operation: String,
    },

    /// Command requires a logged-in session
    #[error("not connected")]
    NotConnected,

    /// Command rejected before it reached the wire
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Returns true if the same request may succeed later.
    ///
    /// Only [`SessionError::NotConnected`] qualifies: once the session logs
    /// in (or reconnects) the command becomes valid. Validation failures
    /// never change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}
