//! Line classification.
//!
//! Server output has no explicit framing beyond newlines, so each line is
//! matched against an ordered rule table and the first match wins. The
//! order is part of the contract: the command echo is itself a well-formed
//! chat line and must be tested before the generic chat pattern.
//!
//! | # | rule            | shape                                              |
//! |---|-----------------|----------------------------------------------------|
//! | 1 | LoginPrompt     | `Login:`                                           |
//! | 2 | PasswordPrompt  | `Password:`                                        |
//! | 3 | RoomPrompt      | `Your choice           :`                          |
//! | 4 | UnknownUser     | `Unknown user`                                     |
//! | 5 | WrongPassword   | `Wrong password!`                                  |
//! | 6 | CommandEcho     | `HHMMZ <CALL> <ROOM> chat>`                        |
//! | 7 | ChatLine        | `HHMMZ <sender>> <body>`                           |
//! | 8 | UserRecord      | `<call> <grid> <comment>`, only with no command    |

use std::{fmt, sync::LazyLock};

use regex::{Captures, Regex};

use crate::{
    command::CommandKind,
    error::ProtocolError,
    locator::Locator,
    message::{ChatMessage, ChatTime, UserRecord},
};

/// Timestamped chat line, live or historical.
#[allow(clippy::expect_used)]
static CHAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})Z (.+)>(.*)$").expect("invariant: chat line pattern is valid")
});

/// One row of the user list.
#[allow(clippy::expect_used)]
static USER_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S{3,})\s+(\S+)\s(.*)$").expect("invariant: user record pattern is valid")
});

/// Why the server refused the login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Username is not registered
    UnknownUser,
    /// Password does not match
    WrongPassword,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUser => f.write_str("unknown user"),
            Self::WrongPassword => f.write_str("wrong password"),
        }
    }
}

/// What a single line means to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Server asks for the username
    LoginPrompt,
    /// Server asks for the password
    PasswordPrompt,
    /// Server asks which room to join
    RoomPrompt,
    /// Login refused
    AuthError(AuthErrorKind),
    /// Our own prompt: the active command's output is complete
    CommandEcho {
        /// Server time of the prompt
        time: ChatTime,
    },
    /// Timestamped message
    ChatLine {
        /// Server time
        time: ChatTime,
        /// Sender as printed (`CALL Name`)
        sender: String,
        /// Message text
        body: String,
    },
    /// A user-list row seen outside any command
    UserRecordLine(UserRecord),
    /// Anything else while a command is active
    CommandOutput(String),
    /// Anything else while idle
    Unrecognized(String),
}

impl LineEvent {
    /// Whether the server sends this shape without a line terminator.
    pub fn is_prompt(&self) -> bool {
        matches!(
            self,
            Self::LoginPrompt | Self::PasswordPrompt | Self::RoomPrompt | Self::CommandEcho { .. }
        )
    }
}

/// Identifies one entry of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `Login:`
    LoginPrompt,
    /// `Password:`
    PasswordPrompt,
    /// `Your choice           :`
    RoomPrompt,
    /// `Unknown user`
    UnknownUser,
    /// `Wrong password!`
    WrongPassword,
    /// `HHMMZ <CALL> <ROOM> chat>`
    CommandEcho,
    /// `HHMMZ <sender>> <body>`
    ChatLine,
    /// `<call> <grid> <comment>`
    UserRecord,
}

#[derive(Debug)]
enum Matcher {
    Prefix(&'static str),
    Pattern(Regex),
}

#[derive(Debug)]
struct Rule {
    kind: RuleKind,
    matcher: Matcher,
}

impl Rule {
    fn prefix(kind: RuleKind, prefix: &'static str) -> Self {
        Self { kind, matcher: Matcher::Prefix(prefix) }
    }

    fn pattern(kind: RuleKind, pattern: Regex) -> Self {
        Self { kind, matcher: Matcher::Pattern(pattern) }
    }

    fn apply(&self, line: &str) -> Option<LineEvent> {
        match &self.matcher {
            Matcher::Prefix(prefix) if line.starts_with(prefix) => self.fixed_event(),
            Matcher::Prefix(_) => None,
            Matcher::Pattern(pattern) => self.build(&pattern.captures(line)?),
        }
    }

    fn fixed_event(&self) -> Option<LineEvent> {
        match self.kind {
            RuleKind::LoginPrompt => Some(LineEvent::LoginPrompt),
            RuleKind::PasswordPrompt => Some(LineEvent::PasswordPrompt),
            RuleKind::RoomPrompt => Some(LineEvent::RoomPrompt),
            RuleKind::UnknownUser => Some(LineEvent::AuthError(AuthErrorKind::UnknownUser)),
            RuleKind::WrongPassword => Some(LineEvent::AuthError(AuthErrorKind::WrongPassword)),
            RuleKind::CommandEcho | RuleKind::ChatLine | RuleKind::UserRecord => None,
        }
    }

    fn build(&self, caps: &Captures<'_>) -> Option<LineEvent> {
        match self.kind {
            RuleKind::CommandEcho => Some(LineEvent::CommandEcho { time: ChatTime::parse(&caps[1])? }),
            RuleKind::ChatLine => {
                let (time, sender, body) = chat_parts(caps)?;
                Some(LineEvent::ChatLine { time, sender, body })
            },
            RuleKind::UserRecord => Some(LineEvent::UserRecordLine(user_from(caps))),
            RuleKind::LoginPrompt
            | RuleKind::PasswordPrompt
            | RuleKind::RoomPrompt
            | RuleKind::UnknownUser
            | RuleKind::WrongPassword => None,
        }
    }
}

/// Ordered line classifier for one session.
///
/// The command-echo rule depends on our callsign and room, so a classifier
/// is built per session.
#[derive(Debug)]
pub struct LineClassifier {
    rules: Vec<Rule>,
}

impl LineClassifier {
    /// Build the rule table for `callsign` chatting in `room_name`.
    pub fn new(callsign: &str, room_name: &str) -> Result<Self, ProtocolError> {
        let echo = Regex::new(&format!(
            r"^(\d{{4}})Z {} {} chat>(.*)$",
            regex::escape(&callsign.trim().to_ascii_uppercase()),
            regex::escape(room_name.trim()),
        ))?;

        let rules = vec![
            Rule::prefix(RuleKind::LoginPrompt, "Login:"),
            Rule::prefix(RuleKind::PasswordPrompt, "Password:"),
            Rule::prefix(RuleKind::RoomPrompt, "Your choice           :"),
            Rule::prefix(RuleKind::UnknownUser, "Unknown user"),
            Rule::prefix(RuleKind::WrongPassword, "Wrong password!"),
            Rule::pattern(RuleKind::CommandEcho, echo),
            Rule::pattern(RuleKind::ChatLine, CHAT_LINE.clone()),
            Rule::pattern(RuleKind::UserRecord, USER_RECORD.clone()),
        ];

        Ok(Self { rules })
    }

    /// Rule kinds in evaluation order.
    pub fn rule_order(&self) -> Vec<RuleKind> {
        self.rules.iter().map(|r| r.kind).collect()
    }

    /// Classify one line given the kind of the active command, if any.
    pub fn classify(&self, line: &str, active: Option<CommandKind>) -> LineEvent {
        for rule in &self.rules {
            // Outside a command a user row is a roster delta; inside one it
            // belongs to the command's output
            if rule.kind == RuleKind::UserRecord && active.is_some() {
                continue;
            }
            if let Some(event) = rule.apply(line) {
                return event;
            }
        }

        match active {
            Some(_) => LineEvent::CommandOutput(line.to_string()),
            None => LineEvent::Unrecognized(line.to_string()),
        }
    }
}

/// Parse a user-list row. `None` if the line does not have the row shape.
pub fn parse_user_record(line: &str) -> Option<UserRecord> {
    USER_RECORD.captures(line).map(|caps| user_from(&caps))
}

/// Parse a timestamped chat line into a message without grid.
pub fn parse_chat_message(line: &str) -> Option<ChatMessage> {
    let caps = CHAT_LINE.captures(line)?;
    let (time, sender, body) = chat_parts(&caps)?;
    Some(ChatMessage::new(time, sender, body, None))
}

fn chat_parts(caps: &Captures<'_>) -> Option<(ChatTime, String, String)> {
    let time = ChatTime::parse(&caps[1])?;
    Some((time, caps[2].trim().to_string(), caps[3].trim().to_string()))
}

fn user_from(caps: &Captures<'_>) -> UserRecord {
    UserRecord::new(&caps[1], Locator::parse(&caps[2]), caps[3].trim())
}
