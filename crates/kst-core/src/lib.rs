//! KST session engine
//!
//! Pure state machines for one chat connection: the login handshake, the
//! single-slot command channel, roster and message log upkeep, and the
//! reconnection schedule. Nothing here performs I/O. Drivers feed
//! [`SessionInput`]s with the current time and execute the returned
//! [`SessionAction`]s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod env;
pub mod error;
pub mod event;
pub mod log;
pub mod reconnect;
pub mod roster;
pub mod session;

pub use channel::{CommandChannel, CompletedCommand, Completion, Dispatch};
pub use env::{Environment, Moment};
pub use error::SessionError;
pub use event::{ChatEvent, ErrorKind, SessionAction, SessionInput};
pub use log::{DEFAULT_MESSAGE_CAPACITY, MessageLog};
pub use reconnect::{BackoffPolicy, ReconnectController, ReconnectState};
pub use roster::Roster;
pub use session::{Credentials, Session, SessionConfig, SessionPhase};
