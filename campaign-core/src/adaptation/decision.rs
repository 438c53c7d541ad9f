//! Adaptation decisions and how they land on the roadmap.

use crate::roadmap::{
    AdaptationRecord, ChapterModification, DecisionSource, DifficultyTable, PlotThreadUpdate,
    RoadmapStore, SceneModification, ThreadStatus,
};
use crate::text::extract_json_object;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Title of the thread the keyword fallback files player influence under.
pub const PLAYER_INFLUENCE_THREAD: &str = "Player Influence";

const DECISION_FIELDS: [&str; 4] = [
    "sceneModifications",
    "chapterModifications",
    "plotThreadUpdates",
    "emergency",
];

/// What to change in the roadmap after a turn. All parts are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdaptationDecision {
    pub scene_modifications: Option<SceneModification>,
    pub chapter_modifications: Option<ChapterModification>,
    pub plot_thread_updates: Option<Vec<PlotThreadUpdate>>,
    /// Insert the next emergency scenario after the current scene.
    pub emergency: bool,
    #[serde(skip)]
    pub source: DecisionSource,
}

impl AdaptationDecision {
    /// A decision that changes nothing.
    pub fn none(source: DecisionSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scene_modifications.is_none()
            && self.chapter_modifications.is_none()
            && self.plot_thread_updates.as_ref().map_or(true, Vec::is_empty)
            && !self.emergency
    }

    /// Read a decision from the backend's reply.
    ///
    /// A JSON object that is empty or carries any decision field is read
    /// field by field, and a field that does not match its shape is dropped
    /// on its own. Without such an object the remaining prose is scanned for
    /// the words "scene", "chapter" and "plot", each of which switches on a
    /// minimal note-only change.
    pub fn from_reply(reply: &str, action: &str) -> Self {
        let Some((value, range)) = extract_json_object(reply) else {
            return Self::coarse(reply, action);
        };
        match value {
            Value::Object(map)
                if map.is_empty() || DECISION_FIELDS.iter().any(|f| map.contains_key(*f)) =>
            {
                Self::from_fields(&map)
            }
            _ => {
                let mut prose = reply.to_string();
                prose.replace_range(range, "");
                Self::coarse(&prose, action)
            }
        }
    }

    fn from_fields(map: &Map<String, Value>) -> Self {
        Self {
            scene_modifications: decision_field(map, "sceneModifications"),
            chapter_modifications: decision_field(map, "chapterModifications"),
            plot_thread_updates: decision_field(map, "plotThreadUpdates"),
            emergency: map.get("emergency").and_then(Value::as_bool).unwrap_or(false),
            source: DecisionSource::Structured,
        }
    }

    /// Keyword reading of free-form analysis text.
    pub fn coarse(reply: &str, action: &str) -> Self {
        let lower = reply.to_lowercase();
        let note = format!("Adapted after: {}", action.trim());

        Self {
            scene_modifications: lower
                .contains("scene")
                .then(|| SceneModification::note(note.clone())),
            chapter_modifications: lower
                .contains("chapter")
                .then(|| ChapterModification::note(note.clone())),
            plot_thread_updates: lower.contains("plot").then(|| {
                vec![PlotThreadUpdate {
                    title: PLAYER_INFLUENCE_THREAD.to_string(),
                    status: ThreadStatus::Developing,
                    details: Some(action.trim().to_string()),
                }]
            }),
            emergency: false,
            source: DecisionSource::Coarse,
        }
    }

    /// Apply to the store and log the attempt. The record is appended even
    /// when nothing changed.
    ///
    /// Returns the record and the emergency scene title, if one was inserted.
    pub fn apply_to(
        &self,
        store: &mut RoadmapStore,
        action: &str,
        table: &DifficultyTable,
    ) -> (AdaptationRecord, Option<String>) {
        let cursor = store.cursor();
        let mut record = AdaptationRecord {
            chapter_index: cursor.chapter,
            scene_index: cursor.scene,
            action: action.to_string(),
            source: self.source,
            scene_modified: false,
            chapter_modified: false,
            plot_threads_updated: 0,
            emergency: false,
            timestamp: Utc::now(),
        };

        if let Some(patch) = self.scene_modifications.as_ref().filter(|p| !p.is_empty()) {
            match store.apply_scene_modification(patch) {
                Ok(()) => record.scene_modified = true,
                Err(e) => tracing::warn!(error = %e, "Scene modification not applied"),
            }
        }

        if let Some(patch) = &self.chapter_modifications {
            match store.apply_chapter_modification(patch) {
                Ok(()) => record.chapter_modified = true,
                Err(e) => tracing::warn!(error = %e, "Chapter modification not applied"),
            }
        }

        for update in self.plot_thread_updates.iter().flatten() {
            if update.title.trim().is_empty() {
                continue;
            }
            match store.update_plot_thread(&update.title, update.status, update.details.as_deref()) {
                Ok(created) => {
                    record.plot_threads_updated += 1;
                    if created {
                        tracing::debug!(title = %update.title, "New plot thread");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Plot thread update not applied"),
            }
        }

        if record.scene_modified || record.chapter_modified {
            store.normalize_difficulty(table);
        }

        let emergency = if self.emergency {
            store.activate_emergency().map(|scene| scene.title)
        } else {
            None
        };
        record.emergency = emergency.is_some();

        tracing::debug!(
            source = ?record.source,
            scene = record.scene_modified,
            chapter = record.chapter_modified,
            threads = record.plot_threads_updated,
            emergency = record.emergency,
            "Adaptation applied"
        );
        store.record_adaptation(record.clone());
        (record, emergency)
    }
}

fn decision_field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(field = key, error = %e, "Dropping malformed adaptation field");
            None
        }
    }
}
