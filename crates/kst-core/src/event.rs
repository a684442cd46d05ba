//! Session inputs, actions and application-facing events.

use std::fmt;

use kst_proto::{ChatMessage, Locator, UserRecord};

/// Inputs the driver feeds into the session.
///
/// The driver is responsible for:
/// - Reading bytes from the transport
/// - Driving time forward via ticks
/// - Forwarding user intents (send text, change grid, ...)
///
/// Generic over `I` (Instant type) so tests can use virtual time.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput<I> {
    /// TCP connection established.
    TransportReady {
        /// Current time from the environment.
        now: I,
    },

    /// Bytes read from the transport, in arrival order.
    Received {
        /// Raw chunk; may split lines anywhere.
        data: Vec<u8>,
        /// Current time from the environment.
        now: I,
    },

    /// Time tick for timer processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// User typed a line of text.
    SendText {
        /// Text as typed.
        text: String,
        /// Current time from the environment.
        now: I,
    },

    /// User changed their grid square.
    SetGrid {
        /// New grid.
        grid: Locator,
        /// Current time from the environment.
        now: I,
    },

    /// User asked for a fresh roster.
    RefreshUsers {
        /// Current time from the environment.
        now: I,
    },

    /// User asked for room history.
    LoadHistory {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the driver must execute, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write this line (terminator added by the codec).
    Transmit(String),

    /// Publish to subscribers.
    Emit(ChatEvent),

    /// Hand a live message to the notification sink.
    Notify(ChatMessage),

    /// Close the transport. Session-initiated closes are never retried.
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Category of an [`ChatEvent::ErrorRaised`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Server refused the login
    Auth,
    /// Connection could not be made or was lost
    Transport,
    /// A line could not be written
    Send,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Transport => "transport",
            Self::Send => "send",
        };
        f.write_str(name)
    }
}

/// Events published to every subscriber of a chat client.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Login completed (`true`) or the connection went away (`false`).
    ConnectionStateChanged {
        /// Whether the session is now logged in.
        connected: bool,
    },

    /// A message was appended to the log.
    MessageAppended(ChatMessage),

    /// A history batch was spliced in front of the log, oldest first.
    HistoryLoaded(Vec<ChatMessage>),

    /// The roster was replaced; full new contents sorted by callsign.
    RosterReplaced(Vec<UserRecord>),

    /// A user joined without a roster refresh.
    UserUpserted(UserRecord),

    /// Something went wrong.
    ErrorRaised {
        /// Category.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// Login completed after an automatic reconnection.
    Reconnected,
}
