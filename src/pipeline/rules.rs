//! Reply classification rules.
//!
//! A reply whose body mentions "urgent" or "question" (any case, anywhere,
//! including inside longer words) needs a human follow-up. Everything else
//! gets an auto-reply draft.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::ReplyRoute;

/// A body pattern that routes a reply to the follow-up advisor.
#[derive(Debug, Clone)]
pub struct FollowUpRule {
    /// Human-readable keyword.
    pub keyword: String,
    pub regex: Regex,
}

/// Keyword classifier for inbound replies.
pub struct RulesEngine {
    follow_up_rules: Vec<FollowUpRule>,
}

impl RulesEngine {
    /// The default keywords: `urgent` and `question`.
    pub fn default_rules() -> Self {
        let mut engine = Self::empty();
        for keyword in ["urgent", "question"] {
            engine.add_follow_up_keyword(keyword);
        }
        engine
    }

    /// Create an empty rules engine (for testing).
    pub fn empty() -> Self {
        Self {
            follow_up_rules: Vec::new(),
        }
    }

    /// Route bodies containing `keyword` (case-insensitive substring) to follow-up.
    pub fn add_follow_up_keyword(&mut self, keyword: &str) {
        let pattern = format!("(?i){}", regex::escape(keyword));
        // Escaped literals always compile.
        if let Ok(regex) = Regex::new(&pattern) {
            self.follow_up_rules.push(FollowUpRule {
                keyword: keyword.to_string(),
                regex,
            });
        }
    }

    pub fn classify(&self, body: &str) -> ReplyRoute {
        match self.follow_up_rules.iter().find(|r| r.regex.is_match(body)) {
            Some(rule) => {
                debug!(keyword = %rule.keyword, "Reply matched follow-up rule");
                ReplyRoute::FollowUp
            }
            None => ReplyRoute::AutoReply,
        }
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_any_case_needs_follow_up() {
        let engine = RulesEngine::default_rules();
        assert_eq!(engine.classify("This is URGENT, call me"), ReplyRoute::FollowUp);
        assert_eq!(engine.classify("Urgent!"), ReplyRoute::FollowUp);
    }

    #[test]
    fn question_needs_follow_up() {
        let engine = RulesEngine::default_rules();
        assert_eq!(engine.classify("I have a Question about fees"), ReplyRoute::FollowUp);
    }

    #[test]
    fn substring_match_counts() {
        let engine = RulesEngine::default_rules();
        assert_eq!(engine.classify("a few questions"), ReplyRoute::FollowUp);
        assert_eq!(engine.classify("non-urgently yours"), ReplyRoute::FollowUp);
    }

    #[test]
    fn ordinary_reply_gets_auto_reply() {
        let engine = RulesEngine::default_rules();
        assert_eq!(engine.classify("Sounds good, thanks"), ReplyRoute::AutoReply);
        assert_eq!(engine.classify(""), ReplyRoute::AutoReply);
    }

    #[test]
    fn question_mark_alone_is_not_a_question() {
        let engine = RulesEngine::default_rules();
        assert_eq!(engine.classify("When?"), ReplyRoute::AutoReply);
    }

    #[test]
    fn empty_engine_never_escalates() {
        let engine = RulesEngine::empty();
        assert_eq!(engine.classify("urgent question"), ReplyRoute::AutoReply);
    }

    #[test]
    fn custom_keyword_is_escaped() {
        let mut engine = RulesEngine::empty();
        engine.add_follow_up_keyword("term sheet?");
        assert_eq!(engine.classify("send the Term Sheet?"), ReplyRoute::FollowUp);
        assert_eq!(engine.classify("send the term sheets"), ReplyRoute::AutoReply);
    }
}
