//! Per-recipient conversation history for follow-up prompts.

use std::collections::{HashMap, VecDeque};

/// Default number of exchanges kept per recipient.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// One inbound reply and the text generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub inbound: String,
    pub generated: String,
}

/// Bounded history keyed by lowercase recipient address.
#[derive(Debug)]
pub struct ConversationMemory {
    histories: HashMap<String, VecDeque<Exchange>>,
    max_turns: usize,
}

impl ConversationMemory {
    /// `max_turns` of zero is treated as one.
    pub fn new(max_turns: usize) -> Self {
        Self {
            histories: HashMap::new(),
            max_turns: max_turns.max(1),
        }
    }

    fn key(recipient: &str) -> String {
        recipient.trim().to_lowercase()
    }

    /// Append an exchange, dropping the oldest past the bound.
    pub fn record(&mut self, recipient: &str, inbound: &str, generated: &str) {
        let history = self.histories.entry(Self::key(recipient)).or_default();
        history.push_back(Exchange {
            inbound: inbound.to_string(),
            generated: generated.to_string(),
        });
        while history.len() > self.max_turns {
            history.pop_front();
        }
    }

    pub fn exchanges(&self, recipient: &str) -> Vec<Exchange> {
        self.histories
            .get(&Self::key(recipient))
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History rendered for a prompt; empty when there is none.
    pub fn render(&self, recipient: &str) -> String {
        let Some(history) = self.histories.get(&Self::key(recipient)) else {
            return String::new();
        };
        history
            .iter()
            .map(|e| format!("Them: {}\nUs: {}", e.inbound.trim(), e.generated.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn recipients(&self) -> usize {
        self.histories.len()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
