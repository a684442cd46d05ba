//! KST chat wire layer
//!
//! Sans-IO building blocks for the ON4KST-style telnet chat dialect: turning
//! a byte stream into lines, deciding what each line means, and building the
//! fixed set of outbound commands.
//!
//! # Components
//!
//! - [`LineFramer`] / [`LineCodec`]: byte stream to trimmed, non-empty lines
//! - [`LineClassifier`]: ordered rule table from line to [`LineEvent`]
//! - [`PendingCommand`]: outbound command with local validation
//! - [`Locator`]: Maidenhead grid square value type
//! - [`ChatMessage`] / [`UserRecord`]: parsed server output

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod classify;
pub mod command;
pub mod error;
pub mod framer;
pub mod locator;
pub mod message;
pub mod room;

pub use classify::{
    AuthErrorKind, LineClassifier, LineEvent, RuleKind, parse_chat_message, parse_user_record,
};
pub use command::{CommandKind, DEFAULT_HISTORY_COUNT, PendingCommand};
pub use error::ProtocolError;
pub use framer::{LineCodec, LineFramer};
pub use locator::Locator;
pub use message::{ChatMessage, ChatTime, UserRecord, normalize_callsign};
pub use room::{KNOWN_ROOMS, Room};
