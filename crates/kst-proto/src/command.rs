//! Outbound commands and their local validation.

use std::fmt;

use crate::{error::ProtocolError, locator::Locator};

/// Command word the client never sends.
const FORBIDDEN_PREFIX: &str = "/chat";

/// Wire form of the user-list request.
pub const SHOW_USERS: &str = "/sh us";

/// Number of history entries requested by default.
pub const DEFAULT_HISTORY_COUNT: u16 = 50;

/// What a command is, which decides how its output is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Username, password or room index during login
    Login,
    /// Free text typed by the user (chat or server command)
    UserCommand,
    /// `/sh us`
    ShowUsers,
    /// `/set qra <GRID>`
    SetGrid,
    /// `/show msg <N>`
    ShowMessages,
}

/// A command waiting to be (or being) executed.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingCommand {
    kind: CommandKind,
    payload: String,
}

impl PendingCommand {
    /// Login answer (username, password or room index).
    pub fn login(payload: impl Into<String>) -> Self {
        Self { kind: CommandKind::Login, payload: payload.into() }
    }

    /// Free text from the user.
    ///
    /// Rejects empty text and the `/chat` command. Embedded line breaks are
    /// flattened so one call is always one wire line.
    pub fn user_text(text: &str) -> Result<Self, ProtocolError> {
        let flattened = text.replace(['\r', '\n'], " ");
        let trimmed = flattened.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::EmptyCommand);
        }

        let head = trimmed.get(..FORBIDDEN_PREFIX.len()).unwrap_or_default();
        if head.eq_ignore_ascii_case(FORBIDDEN_PREFIX) {
            let command = trimmed.split_whitespace().next().unwrap_or(FORBIDDEN_PREFIX);
            return Err(ProtocolError::ForbiddenCommand { command: command.to_string() });
        }

        Ok(Self { kind: CommandKind::UserCommand, payload: trimmed.to_string() })
    }

    /// Announce our grid square.
    pub fn set_grid(grid: &Locator) -> Result<Self, ProtocolError> {
        if !grid.is_valid() {
            return Err(ProtocolError::InvalidLocator { raw: grid.raw().to_string() });
        }
        Ok(Self { kind: CommandKind::SetGrid, payload: format!("/set qra {}", grid.raw()) })
    }

    /// Request the user list.
    pub fn show_users() -> Self {
        Self { kind: CommandKind::ShowUsers, payload: SHOW_USERS.to_string() }
    }

    /// Request the last `count` messages of the room.
    pub fn show_messages(count: u16) -> Self {
        Self { kind: CommandKind::ShowMessages, payload: format!("/show msg {count}") }
    }

    /// Command kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Text written to the wire (without terminator).
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume into the wire text.
    pub fn into_payload(self) -> String {
        self.payload
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Login payloads include the password
        let payload: &str = if self.kind == CommandKind::Login { "<redacted>" } else { &self.payload };
        f.debug_struct("PendingCommand").field("kind", &self.kind).field("payload", &payload).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_wire_strings() {
        assert_eq!(PendingCommand::show_users().payload(), "/sh us");
        assert_eq!(PendingCommand::show_messages(50).payload(), "/show msg 50");
        let grid = Locator::parse("jo20eu");
        assert_eq!(PendingCommand::set_grid(&grid).unwrap().payload(), "/set qra JO20EU");
    }

    #[test]
    fn rejects_chat_command_case_insensitively() {
        for text in ["/chat W1ABC hi", "  /CHAT", "/Chatter"] {
            assert!(matches!(
                PendingCommand::user_text(text),
                Err(ProtocolError::ForbiddenCommand { .. })
            ));
        }
        assert!(PendingCommand::user_text("/cq W1ABC").is_ok());
    }

    #[test]
    fn rejects_empty_and_flattens_newlines() {
        assert_eq!(PendingCommand::user_text(" \r\n "), Err(ProtocolError::EmptyCommand));
        let cmd = PendingCommand::user_text("hello\r\nworld").unwrap();
        assert_eq!(cmd.payload(), "hello  world");
        assert_eq!(cmd.kind(), CommandKind::UserCommand);
    }

    #[test]
    fn set_grid_requires_valid_locator() {
        assert!(PendingCommand::set_grid(&Locator::parse("XX")).is_err());
    }

    #[test]
    fn debug_redacts_login_payload() {
        let rendered = format!("{:?}", PendingCommand::login("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
