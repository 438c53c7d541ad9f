//! Conversation history.
//!
//! A bounded window of player and narrator turns. Once the limit is exceeded
//! the oldest turns are dropped first.

use crate::text::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of turns kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Player,
    Narrator,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Player => "Player",
            Speaker::Narrator => "Narrator",
        }
    }
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn add_player(&mut self, text: &str) {
        self.push(Speaker::Player, text);
    }

    pub fn add_narrator(&mut self, text: &str) {
        self.push(Speaker::Narrator, text);
    }

    fn push(&mut self, role: Speaker, text: &str) {
        self.turns.push_back(Turn {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        self.trim();
    }

    /// The last `count` turns, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Turn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(count))
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the limit, trimming immediately if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.trim();
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render the last `count` turns as a transcript.
    pub fn transcript(&self, count: usize) -> String {
        self.recent(count)
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Short plain-text summary used as save-file metadata.
    pub fn summary(&self) -> String {
        let exchanges = self
            .turns
            .iter()
            .filter(|t| t.role == Speaker::Player)
            .count();
        let mut summary = format!("{exchanges} player actions.");

        if let Some(last) = self.turns.iter().rev().find(|t| t.role == Speaker::Player) {
            summary.push_str(&format!(" Last: {}", truncate_chars(&last.text, 100)));
        }
        summary
    }

    fn trim(&mut self) {
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_trim() {
        let mut history = ConversationHistory::new(3);
        history.add_player("one");
        history.add_narrator("two");
        history.add_player("three");
        history.add_narrator("four");

        assert_eq!(history.len(), 3);
        let texts: Vec<_> = history.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three", "four"]);
    }

    #[test]
    fn test_recent_and_transcript() {
        let mut history = ConversationHistory::default();
        history.add_player("I open the door");
        history.add_narrator("It creaks");
        history.add_player("I step inside");

        let recent: Vec<_> = history.recent(2).map(|t| t.text.as_str()).collect();
        assert_eq!(recent, vec!["It creaks", "I step inside"]);
        assert_eq!(
            history.transcript(2),
            "Narrator: It creaks\nPlayer: I step inside"
        );
        assert_eq!(history.recent(10).count(), 3);
    }

    #[test]
    fn test_set_limit_trims() {
        let mut history = ConversationHistory::new(10);
        for i in 0..6 {
            history.add_player(&i.to_string());
        }
        history.set_limit(2);
        let texts: Vec<_> = history.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["4", "5"]);
    }

    #[test]
    fn test_summary() {
        let mut history = ConversationHistory::default();
        assert_eq!(history.summary(), "0 player actions.");
        history.add_player("I look around");
        history.add_narrator("Fog everywhere");
        assert_eq!(history.summary(), "1 player actions. Last: I look around");
    }
}
