//! Error types for the KST wire layer.
//!
//! Everything here is a local validation failure: these errors are produced
//! before anything touches the transport and never reach the session.

use thiserror::Error;

/// Errors produced while validating or building protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Grid square does not match the 6-character Maidenhead pattern
    #[error("invalid locator {raw:?}: expected two letters A-R, two digits, two letters A-X")]
    InvalidLocator {
        /// Offending input
        raw: String,
    },

    /// Outbound text uses a command the client refuses to send
    #[error("command {command:?} is not allowed from this client")]
    ForbiddenCommand {
        /// The rejected command word
        command: String,
    },

    /// Outbound text is empty after trimming
    #[error("refusing to send an empty command")]
    EmptyCommand,

    /// A line pattern failed to compile
    #[error("invalid line pattern: {0}")]
    InvalidPattern(String),
}

impl From<regex::Error> for ProtocolError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}
