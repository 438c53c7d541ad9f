//! The campaign roadmap: schema, difficulty rules, and the cursor-owning store.

mod difficulty;
mod history;
mod patch;
mod store;
mod types;

pub use difficulty::{DifficultyTable, MAX_DIFFICULTY, MIN_DIFFICULTY};
pub use history::{AdaptationRecord, ChoiceRecord, DecisionSource};
pub use patch::{ChapterModification, PlotThreadUpdate, SceneModification, SceneRef};
pub use store::{AdvanceOutcome, Cursor, Progress, RoadmapStore, StoreHistory, StoreSnapshot};
pub use types::{
    Chapter, DifficultyProgression, Location, LocationKind, Npc, NpcRole, PlotThread, Roadmap,
    Scene, SceneType, Theme, ThreadStatus,
};

pub(crate) use types::same_text;

use thiserror::Error;

/// Errors from roadmap operations.
#[derive(Debug, Error)]
pub enum RoadmapError {
    #[error("No roadmap loaded")]
    Uninitialized,

    #[error("Invalid roadmap: {0}")]
    Invalid(String),

    #[error("Cursor ({chapter}, {scene}) does not address a scene")]
    CursorOutOfRange { chapter: usize, scene: usize },
}
