//! Users present in the room, keyed by callsign.

use std::collections::BTreeMap;

use kst_proto::{Locator, UserRecord, normalize_callsign};

/// Room roster.
///
/// Replaced wholesale by every `/sh us` answer and grown one entry at a time
/// by user rows the server pushes unprompted.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: BTreeMap<String, UserRecord>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster.
    ///
    /// When a callsign appears twice the first record wins.
    pub fn replace(&mut self, records: impl IntoIterator<Item = UserRecord>) {
        self.users.clear();
        for record in records {
            self.users.entry(record.callsign().to_string()).or_insert(record);
        }
    }

    /// Add a user if not already present. Returns `true` if added.
    pub fn upsert(&mut self, record: UserRecord) -> bool {
        let key = record.callsign().to_string();
        if self.users.contains_key(&key) {
            return false;
        }
        self.users.insert(key, record);
        true
    }

    /// Look up a user by (possibly decorated) callsign.
    pub fn get(&self, callsign: &str) -> Option<&UserRecord> {
        self.users.get(&normalize_callsign(callsign))
    }

    /// Grid of a user, if present and well-formed.
    pub fn grid_of(&self, callsign: &str) -> Option<Locator> {
        self.get(callsign).map(UserRecord::grid).filter(|g| g.is_valid()).cloned()
    }

    /// Records sorted by callsign.
    pub fn snapshot(&self) -> Vec<UserRecord> {
        self.users.values().cloned().collect()
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// No users known.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Forget everyone.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}
