//! Control signals carried in narration.
//!
//! The backend may end its reply with a fenced ```` ```signals ```` JSON block,
//! and may also drop bracket tokens such as `[SCENE_COMPLETE]` anywhere in
//! the prose. Both are read and OR-ed together, and both are always removed
//! from the text the player sees.

use crate::text::{take_fenced, tidy};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SCENE_COMPLETE: &str = "[SCENE_COMPLETE]";
pub const CHAPTER_ADVANCE: &str = "[CHAPTER_ADVANCE]";
pub const ROADMAP_UPDATE: &str = "[ROADMAP_UPDATE]";
pub const ROLL_DICE: &str = "[ROLL_DICE]";

/// Every reserved token.
pub const SIGNAL_TOKENS: [&str; 4] = [SCENE_COMPLETE, CHAPTER_ADVANCE, ROADMAP_UPDATE, ROLL_DICE];

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r"[ \t]{2,}").expect("valid regex");
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"[ \t]+([.,!?;:])").expect("valid regex");
}

/// What the narrator asked for this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signals {
    pub scene_complete: bool,
    pub chapter_advance: bool,
    pub roadmap_update: bool,
    pub roll_dice: bool,
    /// Objectives of the current scene the narrator considers done.
    pub completed_objectives: Vec<String>,
}

impl Signals {
    /// Whether the cursor should move this turn.
    pub fn wants_advance(&self) -> bool {
        self.scene_complete || self.chapter_advance
    }

    pub fn any(&self) -> bool {
        self.scene_complete
            || self.chapter_advance
            || self.roadmap_update
            || self.roll_dice
            || !self.completed_objectives.is_empty()
    }

    fn merge(&mut self, other: Signals) {
        self.scene_complete |= other.scene_complete;
        self.chapter_advance |= other.chapter_advance;
        self.roadmap_update |= other.roadmap_update;
        self.roll_dice |= other.roll_dice;
        self.completed_objectives.extend(other.completed_objectives);
    }
}

/// Narration with its control signals separated out.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNarration {
    /// Player-visible text with every signal removed.
    pub text: String,
    pub signals: Signals,
    /// Whether a structured signal block was found.
    pub structured: bool,
}

/// Split raw narration into visible text and signals.
pub fn parse_narration(raw: &str) -> ParsedNarration {
    let (mut text, blocks) = take_fenced(raw, "signals");
    let mut signals = Signals::default();
    let mut structured = false;

    for block in blocks {
        match serde_json::from_str::<Signals>(&block) {
            Ok(block) => {
                signals.merge(block);
                structured = true;
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed signal block"),
        }
    }

    // Removing one token can join the halves of another, so repeat until clean.
    loop {
        let mut found = false;
        for token in SIGNAL_TOKENS {
            if text.contains(token) {
                found = true;
                match token {
                    SCENE_COMPLETE => signals.scene_complete = true,
                    CHAPTER_ADVANCE => signals.chapter_advance = true,
                    ROADMAP_UPDATE => signals.roadmap_update = true,
                    _ => signals.roll_dice = true,
                }
                text = text.replace(token, "");
            }
        }
        if !found {
            break;
        }
    }

    ParsedNarration {
        text: clean_whitespace(&text),
        signals,
        structured,
    }
}

/// Whether any reserved token remains in `text`.
pub fn contains_token(text: &str) -> bool {
    SIGNAL_TOKENS.iter().any(|t| text.contains(t))
}

fn clean_whitespace(text: &str) -> String {
    let collapsed = SPACE_RUN.replace_all(text, " ");
    let attached = SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    tidy(&attached)
}
