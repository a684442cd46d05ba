//! Fuzz target for line framing and classification
//!
//! # Strategy
//!
//! - Arbitrary bytes split at arbitrary points (transport fragmentation)
//! - Every emitted line and the pending tail run through the classifier,
//!   both idle and with a command active
//!
//! # Invariants
//!
//! - Chunking never changes the emitted line sequence
//! - Emitted lines are non-empty and have no surrounding whitespace
//! - NEVER panic on malformed input (invalid UTF-8, stray CR, NUL)

#![no_main]

use arbitrary::Arbitrary;
use kst_proto::{CommandKind, LineClassifier, LineFramer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    bytes: Vec<u8>,
    cuts: Vec<u16>,
}

fuzz_target!(|input: Input| {
    let Ok(classifier) = LineClassifier::new("W1ABC", "144/432 MHz") else {
        return;
    };

    let whole = LineFramer::new().feed(&input.bytes);

    let mut points: Vec<usize> =
        input.cuts.iter().map(|c| usize::from(*c) % (input.bytes.len() + 1)).collect();
    points.sort_unstable();

    let mut framer = LineFramer::new();
    let mut chunked = Vec::new();
    let mut start = 0;
    for point in points {
        chunked.extend(framer.feed(&input.bytes[start..point]));
        start = point;
    }
    chunked.extend(framer.feed(&input.bytes[start..]));

    assert_eq!(whole, chunked, "fragmentation changed the line sequence");

    for line in &whole {
        assert!(!line.is_empty());
        assert_eq!(line.trim(), line);
        let _ = classifier.classify(line, None);
        let _ = classifier.classify(line, Some(CommandKind::ShowUsers));
    }

    if let Some(tail) = framer.pending() {
        let _ = classifier.classify(&tail, None);
    }
});
