//! Chat rooms offered at login.

use std::fmt;

/// Rooms offered by the server, in menu order.
///
/// The name is the text the server echoes in its command prompt, so it must
/// match the server exactly for command completion to be detected.
pub const KNOWN_ROOMS: &[&str] = &[
    "50/70 MHz",
    "144/432 MHz",
    "Microwave",
    "EME/JT65",
    "Low band",
    "50 MHz IARU Region 3",
    "50 MHz IARU Region 2",
    "144/432 MHz IARU Region 2",
    "144/432 MHz IARU Region 3",
    "kHz (2000-630m)",
    "Warc (30,17,12m)",
    "28 MHz",
];

/// A room selected by its 1-based menu index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    index: u8,
    name: String,
}

impl Room {
    /// Room with an explicit prompt name.
    pub fn new(index: u8, name: impl Into<String>) -> Self {
        Self { index, name: name.into() }
    }

    /// Room from the built-in table. `None` for an unknown index.
    pub fn by_index(index: u8) -> Option<Self> {
        let slot = usize::from(index).checked_sub(1)?;
        KNOWN_ROOMS.get(slot).map(|name| Self::new(index, *name))
    }

    /// 1-based menu index sent at the room prompt.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Name as echoed in the command prompt.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(2, KNOWN_ROOMS[1])
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.index)
    }
}
