//! CampaignSession - the primary public API for running a campaign.
//!
//! Wraps the orchestrator, the generation backends, and persistence into a
//! single handle that front ends can drive.

use crate::analyzer::CharacterInfo;
use crate::config::EngineConfig;
use crate::events::CampaignEvent;
use crate::narrator::{
    ActionResult, ConversationHistory, NarrativeOrchestrator, Opening, OrchestratorError,
};
use crate::persist::{auto_save_path, PersistError, SaveMetadata, SavedCampaign};
use crate::roadmap::{RoadmapError, RoadmapStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use textgen::{Claude, FailoverClient, OpenAiCompatible, RetryConfig, TextGenerator};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from CampaignSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Roadmap error: {0}")]
    Roadmap(#[from] RoadmapError),

    #[error("An action is already being processed")]
    Busy,

    #[error("No campaign has been started")]
    NotStarted,
}

impl From<OrchestratorError> for SessionError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Busy => SessionError::Busy,
            OrchestratorError::Roadmap(e) => SessionError::Roadmap(e),
        }
    }
}

/// A running campaign.
pub struct CampaignSession {
    orchestrator: NarrativeOrchestrator,
}

impl CampaignSession {
    pub fn new(generator: Arc<dyn TextGenerator>, config: EngineConfig) -> Self {
        Self {
            orchestrator: NarrativeOrchestrator::new(generator, config),
        }
    }

    /// Build a session from environment variables.
    ///
    /// Claude is the primary backend when `ANTHROPIC_API_KEY` is set; a local
    /// OpenAI-compatible server (`OLLAMA_BASE_URL`, `OLLAMA_MODEL`) is always
    /// added as the last resort.
    pub fn from_env() -> Self {
        let config = EngineConfig::from_env();
        let retry = RetryConfig::default().with_attempt_timeout(config.generation_timeout);
        let mut client = FailoverClient::new(retry);

        match Claude::from_env() {
            Ok(claude) => {
                tracing::info!(model = claude.model(), "Using Claude backend");
                client = client.with_backend(Arc::new(claude));
            }
            Err(e) => tracing::info!(reason = %e, "Claude backend unavailable"),
        }
        let local = OpenAiCompatible::from_env();
        tracing::info!(model = local.model(), "Using local backend as fallback");
        client = client.with_backend(Arc::new(local));

        Self::new(Arc::new(client), config)
    }

    pub fn orchestrator(&self) -> &NarrativeOrchestrator {
        &self.orchestrator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.orchestrator.subscribe()
    }

    /// Start a new campaign.
    pub async fn start(&self, campaign_prompt: &str, character: CharacterInfo) -> Opening {
        self.orchestrator.initialize(campaign_prompt, character).await
    }

    /// Send player input and get the narrated response.
    pub async fn player_action(&self, input: &str) -> ActionResult {
        self.orchestrator.process_player_action(input).await
    }

    /// Read the store and conversation.
    pub async fn inspect<R>(&self, f: impl FnOnce(&RoadmapStore, &ConversationHistory) -> R) -> R {
        self.orchestrator.inspect(f).await
    }

    /// Save the campaign to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<SaveMetadata, SessionError> {
        if !self.orchestrator.is_initialized().await {
            return Err(SessionError::NotStarted);
        }
        let saved = SavedCampaign::new(self.orchestrator.export().await);
        saved.save_json(path).await?;
        Ok(saved.metadata)
    }

    /// Save to the campaign's auto-save slot in `dir`.
    pub async fn auto_save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let title = self
            .orchestrator
            .inspect(|store, _| store.roadmap().map(|r| r.title.clone()))
            .await
            .ok_or(SessionError::NotStarted)?;
        let path = auto_save_path(dir, &title);
        self.save(&path).await?;
        Ok(path)
    }

    /// Replace the current campaign with one loaded from a file.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<SaveMetadata, SessionError> {
        let saved = SavedCampaign::load_json(path).await?;
        self.orchestrator.restore(saved.state).await?;
        Ok(saved.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_env_builds_without_credentials() {
        let session = CampaignSession::from_env();
        let dir = tempfile::TempDir::new().unwrap();

        assert!(!session.orchestrator().is_initialized().await);
        let result = session.save(dir.path().join("empty.json")).await;
        assert!(matches!(result, Err(SessionError::NotStarted)));
        assert!(!dir.path().join("empty.json").exists());
    }
}
