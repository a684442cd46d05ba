//! Typed input lines.

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing to do (blank line).
    Empty,
    /// Leave the program.
    Quit,
    /// Change grid square.
    Grid(String),
    /// Fetch the user list from the server.
    RefreshUsers,
    /// Print the roster known locally.
    Who,
    /// Fetch room history.
    History,
    /// Log in again.
    Connect,
    /// Drop the connection.
    Disconnect,
    /// Anything else goes to the server verbatim.
    Text(String),
}

impl Input {
    /// Interpret one line. Local commands use a `:` prefix so that every
    /// `/` command stays available for the server.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let Some(local) = trimmed.strip_prefix(':') else {
            return Self::Text(trimmed.to_string());
        };

        let mut words = local.split_whitespace();
        match (words.next().map(str::to_ascii_lowercase).as_deref(), words.next()) {
            (Some("q" | "quit"), _) => Self::Quit,
            (Some("grid"), Some(grid)) => Self::Grid(grid.to_string()),
            (Some("users"), _) => Self::RefreshUsers,
            (Some("who"), _) => Self::Who,
            (Some("history"), _) => Self::History,
            (Some("connect"), _) => Self::Connect,
            (Some("disconnect"), _) => Self::Disconnect,
            _ => Self::Text(trimmed.to_string()),
        }
    }
}
