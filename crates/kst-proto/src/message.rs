//! Chat messages and user records.

use std::fmt;

use crate::locator::Locator;

/// Time of day as printed by the server (`HHMMZ`, no date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatTime {
    hours: u8,
    minutes: u8,
}

impl ChatTime {
    /// Build from hours and minutes. No range check beyond the 4-digit form.
    pub fn new(hours: u8, minutes: u8) -> Self {
        Self { hours, minutes }
    }

    /// Parse exactly four ASCII digits.
    pub fn parse(digits: &str) -> Option<Self> {
        let bytes = digits.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let hours = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        let minutes = (bytes[2] - b'0') * 10 + (bytes[3] - b'0');
        Some(Self { hours, minutes })
    }

    /// Hours component.
    pub fn hours(self) -> u8 {
        self.hours
    }

    /// Minutes component.
    pub fn minutes(self) -> u8 {
        self.minutes
    }

    /// Sort key for history: minutes since midnight, no day rollover.
    pub fn minutes_since_midnight(self) -> u16 {
        u16::from(self.hours) * 60 + u16::from(self.minutes)
    }
}

impl fmt::Display for ChatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}Z", self.hours, self.minutes)
    }
}

/// One chat line, live or historical, or a synthetic system message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    time: ChatTime,
    sender: String,
    body: String,
    origin_grid: Option<Locator>,
}

impl ChatMessage {
    /// Message from a named sender.
    pub fn new(
        time: ChatTime,
        sender: impl Into<String>,
        body: impl Into<String>,
        origin_grid: Option<Locator>,
    ) -> Self {
        Self { time, sender: sender.into(), body: body.into(), origin_grid }
    }

    /// Message produced by the client from command output (empty sender).
    pub fn system(time: ChatTime, body: impl Into<String>) -> Self {
        Self::new(time, String::new(), body, None)
    }

    /// Server timestamp.
    pub fn time(&self) -> ChatTime {
        self.time
    }

    /// Sender as printed by the server (`CALL Name`). Empty for system output.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Sender callsign: first word of the sender, parentheses stripped.
    pub fn sender_callsign(&self) -> String {
        self.sender.split_whitespace().next().map(normalize_callsign).unwrap_or_default()
    }

    /// Message text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Sender's grid square when known from the roster.
    pub fn origin_grid(&self) -> Option<&Locator> {
        self.origin_grid.as_ref()
    }

    /// Whether this message was synthesized from command output.
    pub fn is_system(&self) -> bool {
        self.sender.is_empty()
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system() {
            write!(f, "{} {}", self.time, self.body)
        } else {
            write!(f, "{} {}> {}", self.time, self.sender, self.body)
        }
    }
}

/// One row of the user list.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    callsign: String,
    grid: Locator,
    comment: String,
}

impl UserRecord {
    /// Build a record, normalizing the callsign.
    pub fn new(callsign: &str, grid: Locator, comment: impl Into<String>) -> Self {
        Self { callsign: normalize_callsign(callsign), grid, comment: comment.into() }
    }

    /// Uppercase callsign without parentheses.
    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    /// Announced grid square (may be invalid).
    pub fn grid(&self) -> &Locator {
        &self.grid
    }

    /// Free-text comment (usually name and station details).
    pub fn comment(&self) -> &str {
        &self.comment
    }
}

/// Strip the parentheses the server puts around away users and uppercase.
pub fn normalize_callsign(raw: &str) -> String {
    raw.trim().trim_start_matches('(').trim_end_matches(')').to_ascii_uppercase()
}
