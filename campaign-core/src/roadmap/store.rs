//! Roadmap store: the plan, the cursor into it, and the play logs.

use super::history::{AdaptationRecord, ChoiceRecord};
use super::patch::{non_blank, ChapterModification, SceneModification};
use super::types::{Chapter, Roadmap, Scene, ThreadStatus};
use super::RoadmapError;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Position of play within the roadmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub chapter: usize,
    pub scene: usize,
}

impl Cursor {
    pub fn new(chapter: usize, scene: usize) -> Self {
        Self { chapter, scene }
    }
}

/// Result of a cursor advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next scene in the same chapter.
    NextScene(Cursor),
    /// Moved to the first scene of the next chapter.
    NextChapter(Cursor),
    /// Already at the last scene of the last chapter; cursor unchanged.
    CampaignComplete,
}

impl AdvanceOutcome {
    pub fn advanced(&self) -> bool {
        !matches!(self, AdvanceOutcome::CampaignComplete)
    }
}

/// Serializable snapshot of the whole store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub roadmap: Option<Roadmap>,
    pub progress: Progress,
    pub history: StoreHistory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_chapter: usize,
    pub current_scene: usize,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub emergencies_used: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHistory {
    #[serde(default)]
    pub player_choices: Vec<ChoiceRecord>,
    #[serde(default)]
    pub adaptations: Vec<AdaptationRecord>,
}

/// Owns the roadmap and the cursor.
///
/// The cursor always addresses an existing scene once a roadmap is loaded.
/// `advance` is the only operation that moves it; modifications only merge
/// or append, so they can never strand it.
#[derive(Debug, Clone, Default)]
pub struct RoadmapStore {
    roadmap: Option<Roadmap>,
    cursor: Cursor,
    completed: bool,
    emergencies_used: usize,
    choices: Vec<ChoiceRecord>,
    adaptations: Vec<AdaptationRecord>,
}

impl RoadmapStore {
    /// Create an uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store positioned at the start of `roadmap`.
    pub fn from_roadmap(roadmap: Roadmap) -> Result<Self, RoadmapError> {
        let mut store = Self::new();
        store.load(roadmap)?;
        Ok(store)
    }

    /// Replace the roadmap and reset cursor and logs.
    pub fn load(&mut self, roadmap: Roadmap) -> Result<(), RoadmapError> {
        roadmap.validate()?;
        *self = Self {
            roadmap: Some(roadmap),
            ..Self::default()
        };
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.roadmap.is_some()
    }

    pub fn roadmap(&self) -> Option<&Roadmap> {
        self.roadmap.as_ref()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.roadmap.as_ref()?.chapters.get(self.cursor.chapter)
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.current_chapter()?.scenes.get(self.cursor.scene)
    }

    fn roadmap_mut(&mut self) -> Result<&mut Roadmap, RoadmapError> {
        self.roadmap.as_mut().ok_or(RoadmapError::Uninitialized)
    }

    /// Up to `count` scenes after the current one, crossing chapter boundaries.
    pub fn upcoming_scenes(&self, count: usize) -> Vec<(Cursor, &Scene)> {
        let Some(roadmap) = &self.roadmap else {
            return Vec::new();
        };
        roadmap
            .chapters
            .iter()
            .enumerate()
            .skip(self.cursor.chapter)
            .flat_map(|(ci, chapter)| {
                chapter
                    .scenes
                    .iter()
                    .enumerate()
                    .map(move |(si, scene)| (Cursor::new(ci, si), scene))
            })
            .filter(|(c, _)| (c.chapter, c.scene) > (self.cursor.chapter, self.cursor.scene))
            .take(count)
            .collect()
    }

    /// Advance to the next scene, or the next chapter's first scene.
    ///
    /// Returns false, leaving the cursor unchanged, when the current scene is
    /// the last of the last chapter (or the store is uninitialized).
    pub fn advance(&mut self) -> bool {
        self.advance_with_outcome().advanced()
    }

    /// Like `advance`, but reports what kind of step was taken.
    pub fn advance_with_outcome(&mut self) -> AdvanceOutcome {
        let Some(roadmap) = &self.roadmap else {
            return AdvanceOutcome::CampaignComplete;
        };
        let Some(chapter) = roadmap.chapters.get(self.cursor.chapter) else {
            return AdvanceOutcome::CampaignComplete;
        };

        if self.cursor.scene + 1 < chapter.scenes.len() {
            self.cursor.scene += 1;
            self.completed = false;
            tracing::debug!(chapter = self.cursor.chapter, scene = self.cursor.scene, "Advanced to next scene");
            return AdvanceOutcome::NextScene(self.cursor);
        }

        if self.cursor.chapter + 1 < roadmap.chapters.len() {
            self.cursor = Cursor::new(self.cursor.chapter + 1, 0);
            self.completed = false;
            tracing::info!(chapter = self.cursor.chapter, "Advanced to next chapter");
            return AdvanceOutcome::NextChapter(self.cursor);
        }

        if !self.completed {
            tracing::info!("Campaign roadmap complete");
        }
        self.completed = true;
        AdvanceOutcome::CampaignComplete
    }

    /// Merge a modification into the addressed scene.
    pub fn apply_scene_modification(&mut self, patch: &SceneModification) -> Result<(), RoadmapError> {
        let cursor = self.cursor;
        let roadmap = self.roadmap_mut()?;
        let target = patch.target.unwrap_or(super::SceneRef {
            chapter: cursor.chapter,
            scene: cursor.scene,
        });

        let chapter_index = target.chapter.min(roadmap.chapters.len().saturating_sub(1));
        let chapter = roadmap
            .chapters
            .get_mut(chapter_index)
            .ok_or(RoadmapError::Uninitialized)?;

        if chapter_index == target.chapter && target.scene < chapter.scenes.len() {
            patch.merge_into(&mut chapter.scenes[target.scene]);
        } else {
            tracing::debug!(chapter = chapter_index, "Scene target not found, appending new scene");
            chapter.scenes.push(patch.to_scene());
        }
        Ok(())
    }

    /// Merge a modification into the addressed chapter, appending a new
    /// chapter when the index is past the end.
    pub fn apply_chapter_modification(
        &mut self,
        patch: &ChapterModification,
    ) -> Result<(), RoadmapError> {
        let current = self.cursor.chapter;
        let roadmap = self.roadmap_mut()?;
        let index = patch.chapter.unwrap_or(current);

        if let Some(chapter) = roadmap.chapters.get_mut(index) {
            if let Some(title) = non_blank(&patch.title) {
                chapter.title = title.to_string();
            }
            if let Some(description) = non_blank(&patch.description) {
                chapter.description = description.to_string();
            }
            for objective in &patch.add_objectives {
                chapter.add_objective(objective.as_str());
            }
            chapter.scenes.extend(patch.add_scenes.iter().cloned());
            if let Some(note) = non_blank(&patch.note) {
                chapter.notes.push(note.to_string());
            }
            return Ok(());
        }

        let mut chapter = Chapter::new(
            non_blank(&patch.title).unwrap_or("An Unwritten Chapter"),
            non_blank(&patch.description).unwrap_or_default(),
        );
        for objective in &patch.add_objectives {
            chapter.add_objective(objective.as_str());
        }
        chapter.scenes = patch.add_scenes.clone();
        if chapter.scenes.is_empty() {
            chapter.scenes.push(Scene::new(
                "Uncharted Territory",
                "The path ahead has not yet been written.",
                super::SceneType::Story,
                3,
            ));
        }
        if let Some(note) = non_blank(&patch.note) {
            chapter.notes.push(note.to_string());
        }
        tracing::info!(title = %chapter.title, "Appending new chapter to roadmap");
        roadmap.chapters.push(chapter);
        Ok(())
    }

    /// Clamp every scene's difficulty into its type's range.
    pub fn normalize_difficulty(&mut self, table: &super::DifficultyTable) {
        if let Some(roadmap) = self.roadmap.as_mut() {
            roadmap
                .chapters
                .iter_mut()
                .flat_map(|c| c.scenes.iter_mut())
                .for_each(|scene| scene.normalize(table));
        }
    }

    /// Update a plot thread; unknown titles create a new thread.
    ///
    /// Returns true when a new thread was created.
    pub fn update_plot_thread(
        &mut self,
        title: &str,
        status: ThreadStatus,
        details: Option<&str>,
    ) -> Result<bool, RoadmapError> {
        Ok(self.roadmap_mut()?.update_plot_thread(title, status, details))
    }

    /// Mark an objective of the current scene complete.
    pub fn complete_objective(&mut self, objective: &str) -> bool {
        let cursor = self.cursor;
        self.roadmap
            .as_mut()
            .and_then(|r| r.chapters.get_mut(cursor.chapter))
            .and_then(|c| c.scenes.get_mut(cursor.scene))
            .map(|s| s.complete_objective(objective))
            .unwrap_or(false)
    }

    /// Insert the next unused emergency scenario right after the current scene.
    ///
    /// Returns the inserted scene, or None when none remain or the campaign
    /// is already complete.
    pub fn activate_emergency(&mut self) -> Option<Scene> {
        if self.completed {
            return None;
        }
        let cursor = self.cursor;
        let used = self.emergencies_used;
        let roadmap = self.roadmap.as_mut()?;
        let scenario = roadmap.emergency_scenarios.get(used)?.clone();
        let chapter = roadmap.chapters.get_mut(cursor.chapter)?;
        chapter.scenes.insert(cursor.scene + 1, scenario.clone());
        self.emergencies_used += 1;
        tracing::warn!(title = %scenario.title, "Emergency scenario activated");
        Some(scenario)
    }

    pub fn emergencies_remaining(&self) -> usize {
        self.roadmap
            .as_ref()
            .map(|r| r.emergency_scenarios.len().saturating_sub(self.emergencies_used))
            .unwrap_or(0)
    }

    /// Append a player choice at the current position.
    pub fn record_choice(&mut self, action: impl Into<String>, result: impl Into<String>) {
        self.choices.push(ChoiceRecord {
            chapter_index: self.cursor.chapter,
            scene_index: self.cursor.scene,
            action: action.into(),
            result: result.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_adaptation(&mut self, record: AdaptationRecord) {
        self.adaptations.push(record);
    }

    pub fn choices(&self) -> &[ChoiceRecord] {
        &self.choices
    }

    /// The last `count` choices, oldest first.
    pub fn recent_choices(&self, count: usize) -> &[ChoiceRecord] {
        let start = self.choices.len().saturating_sub(count);
        &self.choices[start..]
    }

    pub fn adaptations(&self) -> &[AdaptationRecord] {
        &self.adaptations
    }

    /// Snapshot roadmap, cursor and logs.
    pub fn export_state(&self) -> StoreSnapshot {
        StoreSnapshot {
            roadmap: self.roadmap.clone(),
            progress: Progress {
                current_chapter: self.cursor.chapter,
                current_scene: self.cursor.scene,
                completed: self.completed,
                emergencies_used: self.emergencies_used,
            },
            history: StoreHistory {
                player_choices: self.choices.clone(),
                adaptations: self.adaptations.clone(),
            },
        }
    }

    /// Restore from a snapshot, validating the roadmap and cursor first.
    ///
    /// On error the store is left untouched.
    pub fn import_state(&mut self, snapshot: StoreSnapshot) -> Result<(), RoadmapError> {
        let cursor = Cursor::new(snapshot.progress.current_chapter, snapshot.progress.current_scene);

        if let Some(roadmap) = &snapshot.roadmap {
            roadmap.validate()?;
            let in_range = roadmap
                .chapters
                .get(cursor.chapter)
                .is_some_and(|c| cursor.scene < c.scenes.len());
            if !in_range {
                return Err(RoadmapError::CursorOutOfRange {
                    chapter: cursor.chapter,
                    scene: cursor.scene,
                });
            }
        }

        *self = Self {
            cursor: if snapshot.roadmap.is_some() { cursor } else { Cursor::default() },
            roadmap: snapshot.roadmap,
            completed: snapshot.progress.completed,
            emergencies_used: snapshot.progress.emergencies_used,
            choices: snapshot.history.player_choices,
            adaptations: snapshot.history.adaptations,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::{SceneRef, SceneType, Theme};

    fn roadmap(chapters: usize, scenes: usize) -> Roadmap {
        Roadmap {
            title: "Test".to_string(),
            theme: Theme::Heroic,
            overall_goal: "Win".to_string(),
            estimated_sessions: 1,
            difficulty_progression: Default::default(),
            chapters: (0..chapters)
                .map(|c| Chapter {
                    scenes: (0..scenes)
                        .map(|s| Scene::new(format!("Scene {c}.{s}"), "", SceneType::Story, 2))
                        .collect(),
                    ..Chapter::new(format!("Chapter {c}"), "")
                })
                .collect(),
            npcs: Vec::new(),
            locations: Vec::new(),
            plot_threads: Vec::new(),
            emergency_scenarios: vec![Scene::new("Detour", "Lost", SceneType::Story, 3)],
        }
    }

    #[test]
    fn test_uninitialized_store() {
        let mut store = RoadmapStore::new();
        assert!(store.current_scene().is_none());
        assert!(store.current_chapter().is_none());
        assert!(!store.advance());
        assert!(matches!(
            store.apply_scene_modification(&SceneModification::note("x")),
            Err(RoadmapError::Uninitialized)
        ));
    }

    #[test]
    fn test_advance_sequence() {
        let mut store = RoadmapStore::from_roadmap(roadmap(2, 2)).unwrap();

        assert!(store.advance());
        assert_eq!(store.cursor(), Cursor::new(0, 1));
        assert_eq!(store.advance_with_outcome(), AdvanceOutcome::NextChapter(Cursor::new(1, 0)));
        assert!(store.advance());
        assert_eq!(store.cursor(), Cursor::new(1, 1));

        assert!(!store.advance());
        assert!(!store.advance());
        assert_eq!(store.cursor(), Cursor::new(1, 1));
        assert!(store.is_complete());
    }

    #[test]
    fn test_upcoming_scenes_cross_chapters() {
        let store = RoadmapStore::from_roadmap(roadmap(2, 2)).unwrap();
        let upcoming: Vec<_> = store.upcoming_scenes(3).into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            upcoming,
            vec![Cursor::new(0, 1), Cursor::new(1, 0), Cursor::new(1, 1)]
        );
    }

    #[test]
    fn test_scene_modification_unknown_target_appends() {
        let mut store = RoadmapStore::from_roadmap(roadmap(1, 1)).unwrap();
        let patch = SceneModification {
            target: Some(SceneRef { chapter: 0, scene: 7 }),
            title: Some("Hidden Cellar".into()),
            scene_type: Some(SceneType::Puzzle),
            ..Default::default()
        };

        store.apply_scene_modification(&patch).unwrap();

        let chapter = store.current_chapter().unwrap();
        assert_eq!(chapter.scenes.len(), 2);
        assert_eq!(chapter.scenes[1].title, "Hidden Cellar");
        assert_eq!(store.cursor(), Cursor::new(0, 0));
    }

    #[test]
    fn test_chapter_modification_appends_playable_chapter() {
        let mut store = RoadmapStore::from_roadmap(roadmap(1, 1)).unwrap();
        let patch = ChapterModification {
            chapter: Some(5),
            title: Some("Epilogue".into()),
            ..Default::default()
        };

        store.apply_chapter_modification(&patch).unwrap();

        let roadmap = store.roadmap().unwrap();
        assert_eq!(roadmap.chapters.len(), 2);
        assert_eq!(roadmap.chapters[1].title, "Epilogue");
        assert!(roadmap.validate().is_ok());
    }

    #[test]
    fn test_emergency_inserted_after_current_scene() {
        let mut store = RoadmapStore::from_roadmap(roadmap(1, 2)).unwrap();

        let scene = store.activate_emergency().unwrap();
        assert_eq!(scene.title, "Detour");
        assert_eq!(store.cursor(), Cursor::new(0, 0));
        assert_eq!(store.current_chapter().unwrap().scenes[1].title, "Detour");
        assert_eq!(store.emergencies_remaining(), 0);
        assert!(store.activate_emergency().is_none());
    }

    #[test]
    fn test_import_rejects_out_of_range_cursor() {
        let store = RoadmapStore::from_roadmap(roadmap(1, 1)).unwrap();
        let mut snapshot = store.export_state();
        snapshot.progress.current_scene = 4;

        let mut target = RoadmapStore::new();
        assert!(matches!(
            target.import_state(snapshot),
            Err(RoadmapError::CursorOutOfRange { chapter: 0, scene: 4 })
        ));
        assert!(!target.is_initialized());
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut store = RoadmapStore::from_roadmap(roadmap(2, 2)).unwrap();
        store.record_choice("I open the door", "It creaks");
        store.advance();

        let json = serde_json::to_string(&store.export_state()).unwrap();
        let snapshot: StoreSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = RoadmapStore::new();
        restored.import_state(snapshot).unwrap();

        assert_eq!(restored.cursor(), store.cursor());
        assert_eq!(restored.roadmap(), store.roadmap());
        assert_eq!(restored.choices(), store.choices());
    }
}
