//! Keyword highlighting for incoming messages.

use kst_proto::ChatMessage;

/// Decides whether a message deserves the user's attention.
pub trait HighlightRuleEvaluator {
    /// Whether to highlight `message`, and the rules that matched.
    fn should_highlight(&self, message: &ChatMessage) -> (bool, Vec<String>);
}

/// Case-insensitive keyword matching on the message body.
///
/// The user's own callsign always counts as a keyword.
#[derive(Debug, Clone, Default)]
pub struct KeywordRules {
    keywords: Vec<String>,
}

impl KeywordRules {
    /// Rules for `keywords` plus `own_callsign`. Blank keywords are dropped.
    pub fn new(own_callsign: &str, keywords: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut rules: Vec<String> = Vec::new();
        let own = std::iter::once(own_callsign.to_string());
        for keyword in own.chain(keywords.into_iter().map(|k| k.as_ref().to_string())) {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !rules.contains(&keyword) {
                rules.push(keyword);
            }
        }
        Self { keywords: rules }
    }

    /// Active keywords, lowercased.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl HighlightRuleEvaluator for KeywordRules {
    fn should_highlight(&self, message: &ChatMessage) -> (bool, Vec<String>) {
        if message.is_system() {
            return (false, Vec::new());
        }
        let body = message.body().to_lowercase();
        let matched: Vec<String> =
            self.keywords.iter().filter(|k| body.contains(k.as_str())).cloned().collect();
        (!matched.is_empty(), matched)
    }
}

#[cfg(test)]
mod tests {
    use kst_proto::ChatTime;

    use super::*;

    fn msg(body: &str) -> ChatMessage {
        ChatMessage::new(ChatTime::new(12, 0), "DL1XYZ Hans", body, None)
    }

    #[test]
    fn own_callsign_is_always_a_keyword() {
        let rules = KeywordRules::new("W1ABC", Vec::<String>::new());
        let (hit, matched) = rules.should_highlight(&msg("w1abc pse sked 144.300"));
        assert!(hit);
        assert_eq!(matched, ["w1abc"]);
    }

    #[test]
    fn reports_every_matching_keyword() {
        let rules = KeywordRules::new("W1ABC", ["EME", "sked", " "]);
        assert_eq!(rules.keywords(), ["w1abc", "eme", "sked"]);

        let (hit, matched) = rules.should_highlight(&msg("EME sked tonight?"));
        assert!(hit);
        assert_eq!(matched, ["eme", "sked"]);
    }

    #[test]
    fn system_messages_never_highlight() {
        let rules = KeywordRules::new("W1ABC", ["spots"]);
        let (hit, _) = rules.should_highlight(&ChatMessage::system(ChatTime::new(12, 0), "no spots"));
        assert!(!hit);
    }
}
