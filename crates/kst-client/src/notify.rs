//! Notification hook for live messages.

use kst_proto::ChatMessage;

/// Receives live chat messages and reconnection notices.
///
/// Called from the client task, so implementations must not block. History
/// and command output never reach the sink.
pub trait NotificationSink: Send + Sync {
    /// A live message arrived.
    fn notify(&self, message: &ChatMessage);

    /// The client logged in again after losing the connection.
    fn notify_reconnected(&self) {}
}
