//! Property-based tests for keyword highlighting.

use kst_client::{HighlightRuleEvaluator, KeywordRules};
use kst_proto::{ChatMessage, ChatTime};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_matches_are_exactly_the_contained_keywords(
        keywords in prop::collection::vec("[a-zA-Z0-9]{1,6}", 0..6),
        body in "[ -~]{0,60}",
    ) {
        let rules = KeywordRules::new("W1ABC", &keywords);
        let message = ChatMessage::new(ChatTime::new(12, 0), "DL1XYZ Hans", body.clone(), None);

        let (hit, matched) = rules.should_highlight(&message);
        let lower = body.to_lowercase();

        // PROPERTY: a hit iff something matched, and only real matches reported
        prop_assert_eq!(hit, !matched.is_empty());
        for keyword in &matched {
            prop_assert!(lower.contains(keyword.as_str()));
        }
        for keyword in rules.keywords() {
            prop_assert_eq!(matched.contains(keyword), lower.contains(keyword.as_str()));
        }
    }
}
