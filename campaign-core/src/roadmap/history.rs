//! Append-only audit logs kept alongside the roadmap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One player action and its narrated result, pinned to where it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRecord {
    pub chapter_index: usize,
    pub scene_index: usize,
    pub action: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// Where an adaptation decision came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// Parsed from a typed JSON decision.
    Structured,
    /// Derived from keywords in free-form analysis text.
    Coarse,
    /// Generation failed; nothing was applied.
    #[default]
    Failed,
}

/// One adaptation pass, recorded whether or not it changed anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationRecord {
    pub chapter_index: usize,
    pub scene_index: usize,
    pub action: String,
    pub source: DecisionSource,
    pub scene_modified: bool,
    pub chapter_modified: bool,
    pub plot_threads_updated: usize,
    #[serde(default)]
    pub emergency: bool,
    pub timestamp: DateTime<Utc>,
}

impl AdaptationRecord {
    pub fn changed_anything(&self) -> bool {
        self.scene_modified || self.chapter_modified || self.plot_threads_updated > 0 || self.emergency
    }
}
