//! Roadmap schema: the campaign plan and everything it contains.
//!
//! Field names serialize in camelCase. The same schema is what the
//! generation backend is asked to produce and what save files contain.

use super::difficulty::DifficultyTable;
use super::RoadmapError;
use serde::{Deserialize, Serialize};

/// Overall tone of a campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Heroic,
    Dark,
    Mystery,
    Political,
    Exploration,
    Horror,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Heroic,
        Theme::Dark,
        Theme::Mystery,
        Theme::Political,
        Theme::Exploration,
        Theme::Horror,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Heroic => "heroic",
            Theme::Dark => "dark",
            Theme::Mystery => "mystery",
            Theme::Political => "political",
            Theme::Exploration => "exploration",
            Theme::Horror => "horror",
        }
    }

    /// Parse a theme name, tolerating case and surrounding noise.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| lower.starts_with(t.name()))
    }
}

/// How difficulty ramps across the chapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyProgression {
    #[default]
    Gradual,
    Steep,
    Plateau,
}

impl DifficultyProgression {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gradual" => Some(Self::Gradual),
            "steep" => Some(Self::Steep),
            "plateau" => Some(Self::Plateau),
            _ => None,
        }
    }
}

/// Kind of encounter a scene represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    #[default]
    Story,
    Exploration,
    Social,
    Combat,
    Puzzle,
    Climax,
}

impl SceneType {
    pub const ALL: [SceneType; 6] = [
        SceneType::Story,
        SceneType::Exploration,
        SceneType::Social,
        SceneType::Combat,
        SceneType::Puzzle,
        SceneType::Climax,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SceneType::Story => "story",
            SceneType::Exploration => "exploration",
            SceneType::Social => "social",
            SceneType::Combat => "combat",
            SceneType::Puzzle => "puzzle",
            SceneType::Climax => "climax",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| lower.starts_with(t.name()))
    }
}

/// Lifecycle of a plot thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Developing,
    Resolved,
    Dormant,
    Abandoned,
}

impl ThreadStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ThreadStatus::Active => "active",
            ThreadStatus::Developing => "developing",
            ThreadStatus::Resolved => "resolved",
            ThreadStatus::Dormant => "dormant",
            ThreadStatus::Abandoned => "abandoned",
        }
    }

    /// Whether the thread still drives the story.
    pub fn is_open(&self) -> bool {
        matches!(self, ThreadStatus::Active | ThreadStatus::Developing)
    }
}

/// A single encounter or unit of play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub title: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub scene_type: SceneType,
    /// 1-10, kept inside the type's range unless `difficulty_override` is set.
    pub difficulty: u8,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub completed_objectives: Vec<String>,
    /// Suggested player options. Advisory only.
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub difficulty_override: bool,
    /// Adaptation notes accumulated during play.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Scene {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        scene_type: SceneType,
        difficulty: u8,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            scene_type,
            difficulty,
            objectives: Vec::new(),
            completed_objectives: Vec::new(),
            choices: Vec::new(),
            difficulty_override: false,
            notes: Vec::new(),
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.add_objective(objective);
        self
    }

    pub fn with_choice(mut self, choice: impl Into<String>) -> Self {
        self.choices.push(choice.into());
        self
    }

    /// Add an objective unless an equal one (ignoring case) is already present.
    pub fn add_objective(&mut self, objective: impl Into<String>) -> bool {
        insert_unique(&mut self.objectives, objective.into())
    }

    /// Mark an objective complete. Returns false if the scene has no such objective.
    pub fn complete_objective(&mut self, objective: &str) -> bool {
        let Some(found) = self
            .objectives
            .iter()
            .find(|o| same_text(o, objective))
            .cloned()
        else {
            return false;
        };
        insert_unique(&mut self.completed_objectives, found);
        true
    }

    /// Objectives not yet marked complete.
    pub fn unmet_objectives(&self) -> Vec<&str> {
        self.objectives
            .iter()
            .filter(|o| !self.completed_objectives.iter().any(|c| same_text(c, o)))
            .map(String::as_str)
            .collect()
    }

    /// Pull difficulty into the type's configured range.
    pub fn normalize(&mut self, table: &DifficultyTable) {
        if !self.difficulty_override {
            self.difficulty = table.clamp(self.scene_type, self.difficulty);
        }
    }
}

/// A major story beat made of ordered scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            objectives: Vec::new(),
            scenes: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.add_objective(objective);
        self
    }

    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scenes.push(scene);
        self
    }

    pub fn add_objective(&mut self, objective: impl Into<String>) -> bool {
        insert_unique(&mut self.objectives, objective.into())
    }
}

/// What part an NPC plays in the campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NpcRole {
    QuestGiver,
    Mentor,
    Antagonist,
    Ally,
    #[default]
    #[serde(other)]
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    pub name: String,
    #[serde(default)]
    pub role: NpcRole,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationKind {
    Settlement,
    Wilderness,
    Dungeon,
    #[default]
    #[serde(other)]
    Landmark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: LocationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotThread {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ThreadStatus,
}

/// The full campaign plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    pub title: String,
    pub theme: Theme,
    pub overall_goal: String,
    pub estimated_sessions: u32,
    #[serde(default)]
    pub difficulty_progression: DifficultyProgression,
    /// Narrative order. Appended to or modified, never reordered.
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub npcs: Vec<Npc>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub plot_threads: Vec<PlotThread>,
    #[serde(default)]
    pub emergency_scenarios: Vec<Scene>,
}

impl Roadmap {
    /// Check the structural rules every playable roadmap must follow.
    pub fn validate(&self) -> Result<(), RoadmapError> {
        if self.chapters.is_empty() {
            return Err(RoadmapError::Invalid("roadmap has no chapters".to_string()));
        }
        if let Some((index, chapter)) = self
            .chapters
            .iter()
            .enumerate()
            .find(|(_, c)| c.scenes.is_empty())
        {
            return Err(RoadmapError::Invalid(format!(
                "chapter {index} ('{}') has no scenes",
                chapter.title
            )));
        }
        if self.estimated_sessions == 0 {
            return Err(RoadmapError::Invalid(
                "estimated sessions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn total_scenes(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }

    pub fn npc(&self, name: &str) -> Option<&Npc> {
        self.npcs.iter().find(|n| same_text(&n.name, name))
    }

    pub fn antagonist(&self) -> Option<&Npc> {
        self.npcs.iter().find(|n| n.role == NpcRole::Antagonist)
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| same_text(&l.name, name))
    }

    pub fn plot_thread(&self, title: &str) -> Option<&PlotThread> {
        self.plot_threads.iter().find(|t| same_text(&t.title, title))
    }

    /// Threads that are active or developing, in roadmap order.
    pub fn open_threads(&self) -> impl Iterator<Item = &PlotThread> {
        self.plot_threads.iter().filter(|t| t.status.is_open())
    }

    /// Insert or replace an NPC keyed by name.
    pub fn upsert_npc(&mut self, npc: Npc) {
        match self.npcs.iter_mut().find(|n| same_text(&n.name, &npc.name)) {
            Some(existing) => *existing = npc,
            None => self.npcs.push(npc),
        }
    }

    /// Insert or replace a location keyed by name.
    pub fn upsert_location(&mut self, location: Location) {
        match self
            .locations
            .iter_mut()
            .find(|l| same_text(&l.name, &location.name))
        {
            Some(existing) => *existing = location,
            None => self.locations.push(location),
        }
    }

    /// Update a plot thread, creating it when the title is unknown.
    ///
    /// Returns true when a new thread was created.
    pub fn update_plot_thread(
        &mut self,
        title: &str,
        status: ThreadStatus,
        details: Option<&str>,
    ) -> bool {
        if let Some(thread) = self
            .plot_threads
            .iter_mut()
            .find(|t| same_text(&t.title, title))
        {
            thread.status = status;
            if let Some(details) = details.filter(|d| !d.trim().is_empty()) {
                thread.description = details.to_string();
            }
            return false;
        }

        self.plot_threads.push(PlotThread {
            title: title.trim().to_string(),
            description: details.unwrap_or_default().to_string(),
            status,
        });
        true
    }
}

/// Case-insensitive comparison ignoring surrounding whitespace.
pub(crate) fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn insert_unique(list: &mut Vec<String>, value: String) -> bool {
    let value = value.trim().to_string();
    if value.is_empty() || list.iter().any(|v| same_text(v, &value)) {
        return false;
    }
    list.push(value);
    true
}
