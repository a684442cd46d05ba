//! Turning client events into terminal lines.

use std::collections::BTreeMap;

use kst_client::{HighlightRuleEvaluator, KeywordRules};
use kst_core::ChatEvent;
use kst_proto::{ChatMessage, Locator, UserRecord};

/// Terminal bell.
const BELL: char = '\u{7}';

/// Formats events and keeps the local view of the roster.
#[derive(Debug)]
pub struct Renderer {
    rules: KeywordRules,
    home: Option<Locator>,
    users: BTreeMap<String, UserRecord>,
}

impl Renderer {
    /// Renderer highlighting by `rules`, measuring distances from `home`.
    pub fn new(rules: KeywordRules, home: Option<Locator>) -> Self {
        Self { rules, home, users: BTreeMap::new() }
    }

    /// Use a new home grid for distances.
    pub fn set_home(&mut self, home: Locator) {
        self.home = Some(home);
    }

    /// Lines to print for `event`, if any.
    pub fn render(&mut self, event: &ChatEvent) -> Vec<String> {
        match event {
            ChatEvent::ConnectionStateChanged { connected: true } => vec!["*** logged in".into()],
            ChatEvent::ConnectionStateChanged { connected: false } => {
                vec!["*** disconnected".into()]
            },
            ChatEvent::MessageAppended(message) => vec![self.message(message)],
            ChatEvent::HistoryLoaded(batch) => {
                let mut lines = vec![format!("*** {} messages from history", batch.len())];
                lines.extend(batch.iter().map(|m| format!("  {m}")));
                lines
            },
            ChatEvent::RosterReplaced(users) => {
                self.users =
                    users.iter().map(|u| (u.callsign().to_string(), u.clone())).collect();
                vec![format!("*** {} users in room", self.users.len())]
            },
            ChatEvent::UserUpserted(user) => {
                self.users.entry(user.callsign().to_string()).or_insert_with(|| user.clone());
                vec![format!("*** {} joined ({})", user.callsign(), user.grid())]
            },
            ChatEvent::ErrorRaised { kind, message } => vec![format!("!!! {kind}: {message}")],
            ChatEvent::Reconnected => vec!["*** reconnected".into()],
        }
    }

    /// The roster as known locally, one line per user.
    pub fn who(&self) -> Vec<String> {
        self.users.values().map(|u| self.user_line(u)).collect()
    }

    fn message(&self, message: &ChatMessage) -> String {
        if message.is_system() {
            return message.to_string();
        }
        let (highlight, _) = self.rules.should_highlight(message);
        let marker = if highlight { format!("{BELL}>> ") } else { String::new() };
        match self.distance_to(message.origin_grid()) {
            Some(km) => format!("{marker}{message}  [{km:.0} km]"),
            None => format!("{marker}{message}"),
        }
    }

    fn user_line(&self, user: &UserRecord) -> String {
        let bearing = self.home.as_ref().and_then(|home| home.bearing_to(user.grid()));
        match (self.distance_to(Some(user.grid())), bearing) {
            (Some(km), Some(deg)) => format!(
                "{:<10} {:<6} {:>6.0} km {:>4.0}°  {}",
                user.callsign(),
                user.grid(),
                km,
                deg,
                user.comment()
            ),
            _ => format!("{:<10} {:<6}            {}", user.callsign(), user.grid(), user.comment()),
        }
    }

    fn distance_to(&self, grid: Option<&Locator>) -> Option<f64> {
        self.home.as_ref()?.distance_km_to(grid?)
    }
}
