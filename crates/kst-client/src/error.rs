//! Client error types.

use std::{io, time::Duration};

use kst_proto::ProtocolError;
use thiserror::Error;

/// Errors returned by [`crate::ChatClient`] and the transport.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Rejected by local validation; nothing was queued
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client task has stopped
    #[error("client task is closed")]
    Closed,

    /// No credentials available for login
    #[error("no credentials available")]
    MissingCredentials,

    /// TCP handshake did not finish in time
    #[error("connect to {server} timed out after {after:?}")]
    ConnectTimeout {
        /// Address being dialed
        server: String,
        /// Configured timeout
        after: Duration,
    },

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::Io(_))
    }
}
