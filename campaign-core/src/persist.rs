//! Campaign persistence for save/load functionality.
//!
//! A save holds the store snapshot (roadmap, progress, choice and adaptation
//! logs), the conversation window, and the character, wrapped in a versioned
//! JSON envelope with a small metadata block for save pickers.

use crate::narrator::{ConversationHistory, SessionState};
use crate::roadmap::{RoadmapError, RoadmapStore, Theme};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid saved roadmap: {0}")]
    Roadmap(#[from] RoadmapError),
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved campaign with all state needed to resume play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCampaign {
    /// Save format version for compatibility checking.
    pub version: u32,

    pub saved_at: DateTime<Utc>,

    pub state: SessionState,

    pub metadata: SaveMetadata,
}

/// Metadata about the save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    #[serde(default)]
    pub campaign_id: Option<Uuid>,

    pub campaign_title: String,

    pub character_name: String,

    #[serde(default)]
    pub theme: Theme,

    /// One-based chapter number.
    pub chapter: usize,

    #[serde(default)]
    pub scene_title: Option<String>,

    #[serde(default)]
    pub complete: bool,

    /// Short description of recent play.
    #[serde(default)]
    pub summary: String,

    /// Duplicated from the envelope so `peek_metadata` can read it.
    pub saved_at: DateTime<Utc>,
}

impl SavedCampaign {
    pub fn new(state: SessionState) -> Self {
        let saved_at = Utc::now();
        let metadata = SaveMetadata::describe(&state, saved_at);

        Self {
            version: SAVE_VERSION,
            saved_at,
            state,
            metadata,
        }
    }

    pub fn conversation(&self) -> &ConversationHistory {
        &self.state.conversation
    }

    /// Save to a JSON file, creating parent directories as needed.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        tracing::debug!(path = %path.display(), "Campaign saved");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        #[derive(Deserialize)]
        struct Version {
            version: u32,
        }

        let Version { version } = serde_json::from_str(content)?;
        check_version(version)?;
        let saved: Self = serde_json::from_str(content)?;

        // Reject saves whose cursor or roadmap the store would refuse.
        RoadmapStore::new().import_state(saved.state.store.clone())?;
        Ok(saved)
    }

    /// Read a save's metadata without loading the full state.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

impl SaveMetadata {
    fn describe(state: &SessionState, saved_at: DateTime<Utc>) -> Self {
        let roadmap = state.store.roadmap.as_ref();
        let progress = &state.store.progress;
        let scene_title = roadmap
            .and_then(|r| r.chapters.get(progress.current_chapter))
            .and_then(|c| c.scenes.get(progress.current_scene))
            .map(|s| s.title.clone());

        Self {
            campaign_id: state.campaign_id,
            campaign_title: roadmap.map(|r| r.title.clone()).unwrap_or_default(),
            character_name: state.character.name.clone(),
            theme: roadmap.map(|r| r.theme).unwrap_or_default(),
            chapter: progress.current_chapter + 1,
            scene_title,
            complete: progress.completed,
            summary: state.conversation.summary(),
            saved_at,
        }
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// List readable save files in a directory, most recent first.
///
/// Files that are not saves, or are from another version, are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "json") {
            match SavedCampaign::peek_metadata(&path).await {
                Ok(metadata) => saves.push(SaveInfo { path, metadata }),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping file"),
            }
        }
    }

    saves.sort_by(|a, b| b.metadata.saved_at.cmp(&a.metadata.saved_at));
    Ok(saves)
}

fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "campaign".to_string()
    } else {
        sanitized
    }
}

/// Create an auto-save file name.
pub fn auto_save_path(base_dir: impl AsRef<Path>, campaign_title: &str) -> PathBuf {
    base_dir
        .as_ref()
        .join(format!("{}_autosave.json", sanitize(campaign_title)))
}

/// Create a manual save file name with timestamp.
pub fn manual_save_path(base_dir: impl AsRef<Path>, campaign_title: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    base_dir
        .as_ref()
        .join(format!("{}_{timestamp}.json", sanitize(campaign_title)))
}
