//! Structural modifications applied to a roadmap during play.

use super::types::{SceneType, ThreadStatus};
use super::Scene;
use serde::{Deserialize, Serialize};

/// Address of a scene within the roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRef {
    pub chapter: usize,
    pub scene: usize,
}

/// Merge into a scene. `target: None` addresses the current scene.
///
/// A target past the end of its chapter appends a new scene built from the
/// patch; a target chapter past the end of the roadmap falls back to the
/// last chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneModification {
    pub target: Option<SceneRef>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub scene_type: Option<SceneType>,
    pub difficulty: Option<u8>,
    pub add_objectives: Vec<String>,
    pub add_choices: Vec<String>,
    pub note: Option<String>,
}

impl SceneModification {
    /// A patch that only records a note on the current scene.
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.scene_type.is_none()
            && self.difficulty.is_none()
            && self.add_objectives.is_empty()
            && self.add_choices.is_empty()
            && self.note.is_none()
    }

    pub(crate) fn merge_into(&self, scene: &mut Scene) {
        if let Some(title) = non_blank(&self.title) {
            scene.title = title.to_string();
        }
        if let Some(description) = non_blank(&self.description) {
            scene.description = description.to_string();
        }
        if let Some(scene_type) = self.scene_type {
            scene.scene_type = scene_type;
        }
        if let Some(difficulty) = self.difficulty {
            scene.difficulty = difficulty;
        }
        for objective in &self.add_objectives {
            scene.add_objective(objective.as_str());
        }
        scene.choices.extend(
            self.add_choices
                .iter()
                .filter(|c| !c.trim().is_empty())
                .cloned(),
        );
        if let Some(note) = non_blank(&self.note) {
            scene.notes.push(note.to_string());
        }
    }

    pub(crate) fn to_scene(&self) -> Scene {
        let mut scene = Scene::new(
            non_blank(&self.title).unwrap_or("An Unplanned Detour"),
            non_blank(&self.description).unwrap_or_default(),
            self.scene_type.unwrap_or_default(),
            self.difficulty.unwrap_or(3),
        );
        let mut rest = self.clone();
        rest.title = None;
        rest.description = None;
        rest.merge_into(&mut scene);
        scene
    }
}

/// Merge into a chapter. `chapter: None` addresses the current chapter; an
/// index past the end appends a new chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterModification {
    pub chapter: Option<usize>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub add_objectives: Vec<String>,
    /// Scenes appended after the chapter's existing scenes.
    pub add_scenes: Vec<Scene>,
    pub note: Option<String>,
}

impl ChapterModification {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

/// Status change for a plot thread, keyed by title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotThreadUpdate {
    pub title: String,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default)]
    pub details: Option<String>,
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut scene = Scene::new("Docks", "Fog over the water", SceneType::Exploration, 4)
            .with_objective("Find the smuggler");
        let patch = SceneModification {
            description: Some("The fog has lifted".into()),
            add_objectives: vec!["Find the smuggler".into(), "Search the warehouse".into()],
            note: Some("Player bribed the harbormaster".into()),
            ..Default::default()
        };

        patch.merge_into(&mut scene);

        assert_eq!(scene.title, "Docks");
        assert_eq!(scene.description, "The fog has lifted");
        assert_eq!(scene.objectives.len(), 2);
        assert_eq!(scene.notes, vec!["Player bribed the harbormaster"]);
    }

    #[test]
    fn test_blank_title_ignored() {
        let mut scene = Scene::new("Docks", "", SceneType::Story, 2);
        let patch = SceneModification {
            title: Some("   ".into()),
            ..Default::default()
        };
        patch.merge_into(&mut scene);
        assert_eq!(scene.title, "Docks");
    }

    #[test]
    fn test_modification_deserializes_from_partial_json() {
        let patch: SceneModification = serde_json::from_value(serde_json::json!({
            "type": "combat",
            "addObjectives": ["Survive the ambush"]
        }))
        .unwrap();
        assert_eq!(patch.scene_type, Some(SceneType::Combat));
        assert!(patch.target.is_none());
        assert!(!patch.is_empty());
    }
}
