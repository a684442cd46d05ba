//! Client configuration.

use std::time::Duration;

use kst_core::{BackoffPolicy, SessionConfig};

/// Public ON4KST chat server.
pub const DEFAULT_SERVER: &str = "www.on4kst.info:23000";

/// Time allowed for the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle time before the OS starts TCP keep-alive probes.
pub const DEFAULT_KEEPALIVE_TIME: Duration = Duration::from_secs(120);

/// Interval between TCP keep-alive probes.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the chat server
    pub server: String,
    /// Give up on the TCP handshake after this long
    pub connect_timeout: Duration,
    /// OS keep-alive probe timing, `None` to leave the socket default
    pub keepalive: Option<KeepaliveConfig>,
    /// Broadcast channel capacity
    pub event_buffer: usize,
    /// Session timers and limits
    pub session: SessionConfig,
    /// Automatic reconnection schedule
    pub backoff: BackoffPolicy,
}

/// TCP keep-alive probe timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time before probing starts
    pub time: Duration,
    /// Interval between probes
    pub interval: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self { time: DEFAULT_KEEPALIVE_TIME, interval: DEFAULT_KEEPALIVE_INTERVAL }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive: Some(KeepaliveConfig::default()),
            event_buffer: DEFAULT_EVENT_BUFFER,
            session: SessionConfig::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `server`.
    pub fn with_server(server: impl Into<String>) -> Self {
        Self { server: server.into(), ..Self::default() }
    }
}
