//! The narrative orchestrator.
//!
//! Turns a player action into narration: builds the prompt from the roadmap
//! and recent conversation, calls the backend, pulls out control signals,
//! advances the cursor, adapts the roadmap, and hands back the cleaned text.
//!
//! At most one action is in flight per orchestrator. A call that arrives
//! while another is running returns [`ActionStatus::Busy`] immediately and
//! touches nothing.

mod history;
mod openings;
mod prompts;
mod signals;

pub use history::{ConversationHistory, Speaker, Turn, DEFAULT_HISTORY_LIMIT};
pub use openings::fallback_opening;
pub use prompts::{campaign_context, APOLOGY, QUIET_NARRATION};
pub use signals::{
    contains_token, parse_narration, ParsedNarration, Signals, CHAPTER_ADVANCE, ROADMAP_UPDATE,
    ROLL_DICE, SCENE_COMPLETE, SIGNAL_TOKENS,
};

use crate::adaptation::{AdaptationContext, AdaptationDecision, AdaptationEngine};
use crate::analyzer::{fallback_roadmap, CampaignAnalyzer, CharacterInfo, RoadmapSource};
use crate::config::{AdvancePolicy, EngineConfig};
use crate::events::{CampaignEvent, EventBus};
use crate::roadmap::{
    AdaptationRecord, AdvanceOutcome, RoadmapError, RoadmapStore, StoreSnapshot,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use textgen::{GenerationOptions, TextGenerator};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Errors from orchestrator operations that replace state wholesale.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("An action is already being processed")]
    Busy,

    #[error("Roadmap error: {0}")]
    Roadmap(#[from] RoadmapError),
}

/// How a turn went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Ok,
    /// Another action was in flight; nothing happened.
    Busy,
    /// No campaign has been started.
    NotInitialized,
    /// Generation failed; the response is an apology and the cursor did not move.
    Error,
}

/// The outcome of one player action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Player-visible narration, free of control tokens.
    pub response: String,
    pub signals: Signals,
    /// Store state after the turn. None when busy or uninitialized.
    pub snapshot: Option<StoreSnapshot>,
    pub status: ActionStatus,
    /// Set when the narrator asked for an advance and the policy allowed it.
    pub advance: Option<AdvanceOutcome>,
    pub adaptation: Option<AdaptationRecord>,
}

impl ActionResult {
    fn without_state(status: ActionStatus, response: &str) -> Self {
        Self {
            response: response.to_string(),
            signals: Signals::default(),
            snapshot: None,
            status,
            advance: None,
            adaptation: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ActionStatus::Error
    }

    pub fn is_busy(&self) -> bool {
        self.status == ActionStatus::Busy
    }
}

/// The result of starting a campaign.
#[derive(Debug, Clone)]
pub struct Opening {
    pub text: String,
    pub status: ActionStatus,
    /// Which path produced the roadmap. None when busy.
    pub roadmap_source: Option<RoadmapSource>,
    /// Whether the backend wrote the opening text.
    pub generated: bool,
    pub snapshot: Option<StoreSnapshot>,
}

/// Everything needed to resume a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub character: CharacterInfo,
    pub store: StoreSnapshot,
    #[serde(default)]
    pub conversation: ConversationHistory,
}

/// State owned by the orchestrator and mutated only by it.
struct State {
    campaign_id: Option<Uuid>,
    store: RoadmapStore,
    history: ConversationHistory,
    character: CharacterInfo,
    system_context: String,
}

/// Clears the in-flight flag when the turn ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Composition root of the narrative engine.
pub struct NarrativeOrchestrator {
    generator: Arc<dyn TextGenerator>,
    config: EngineConfig,
    analyzer: CampaignAnalyzer,
    adaptation: AdaptationEngine,
    state: Mutex<State>,
    processing: AtomicBool,
    events: EventBus,
}

impl NarrativeOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: EngineConfig) -> Self {
        let analyzer = CampaignAnalyzer::new(generator.clone(), &config);
        let adaptation = AdaptationEngine::new(generator.clone(), &config);
        let state = State {
            campaign_id: None,
            store: RoadmapStore::new(),
            history: ConversationHistory::new(config.history_limit),
            character: CharacterInfo::default(),
            system_context: String::new(),
        };

        Self {
            generator,
            config,
            analyzer,
            adaptation,
            state: Mutex::new(state),
            processing: AtomicBool::new(false),
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.events.subscribe()
    }

    /// Whether an action or initialization is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.store.is_initialized()
    }

    pub async fn campaign_id(&self) -> Option<Uuid> {
        self.state.lock().await.campaign_id
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.store.export_state()
    }

    pub async fn conversation(&self) -> ConversationHistory {
        self.state.lock().await.history.clone()
    }

    /// Read the store and conversation without copying them out.
    pub async fn inspect<R>(&self, f: impl FnOnce(&RoadmapStore, &ConversationHistory) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.store, &state.history)
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.processing))
    }

    /// Start a new campaign, replacing any current one.
    ///
    /// Never fails outright: a failed roadmap request falls back to keyword
    /// analysis and a failed opening falls back to a canned paragraph.
    pub async fn initialize(&self, campaign_prompt: &str, character: CharacterInfo) -> Opening {
        let Some(_in_flight) = self.begin() else {
            tracing::debug!("Initialize rejected, orchestrator busy");
            return Opening {
                text: String::new(),
                status: ActionStatus::Busy,
                roadmap_source: None,
                generated: false,
                snapshot: None,
            };
        };

        let (roadmap, source) = self
            .analyzer
            .generate_with_source(campaign_prompt, &character)
            .await;
        let store = match RoadmapStore::from_roadmap(roadmap) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "Analyzer returned an invalid roadmap, using keyword roadmap");
                let roadmap = fallback_roadmap(campaign_prompt, &character, &self.config.difficulty);
                match RoadmapStore::from_roadmap(roadmap) {
                    Ok(store) => store,
                    Err(e) => {
                        tracing::error!(error = %e, "Keyword roadmap invalid");
                        return Opening {
                            text: APOLOGY.to_string(),
                            status: ActionStatus::Error,
                            roadmap_source: None,
                            generated: false,
                            snapshot: None,
                        };
                    }
                }
            }
        };

        let system_context =
            prompts::system_context(&store, &character, self.config.structured_signals);
        let opening_request = prompts::opening_prompt(&store, &character);
        let options = self
            .config
            .opening
            .clone()
            .with_system_context(system_context.clone());

        let (text, generated) = match self.generate(&opening_request, &options).await {
            Some(raw) => {
                let parsed = parse_narration(&raw);
                if parsed.text.is_empty() {
                    (self.canned_opening(&store), false)
                } else {
                    (parsed.text, true)
                }
            }
            None => (self.canned_opening(&store), false),
        };

        let (title, theme) = store
            .roadmap()
            .map(|r| (r.title.clone(), r.theme))
            .unwrap_or_default();
        let campaign_id = Uuid::new_v4();

        let mut history = ConversationHistory::new(self.config.history_limit);
        history.add_narrator(&text);

        let snapshot = store.export_state();
        *self.state.lock().await = State {
            campaign_id: Some(campaign_id),
            store,
            history,
            character,
            system_context,
        };

        tracing::info!(%campaign_id, %title, theme = theme.name(), ?source, "Campaign started");
        self.events.emit(CampaignEvent::CampaignStarted { title, theme });

        Opening {
            text,
            status: ActionStatus::Ok,
            roadmap_source: Some(source),
            generated,
            snapshot: Some(snapshot),
        }
    }

    /// Narrate the result of a player action and update the campaign.
    pub async fn process_player_action(&self, action: &str) -> ActionResult {
        let Some(_in_flight) = self.begin() else {
            tracing::debug!("Action rejected, orchestrator busy");
            return ActionResult::without_state(
                ActionStatus::Busy,
                "The narrator is still telling the last part. Please wait a moment.",
            );
        };

        let (prompt, options) = {
            let mut state = self.state.lock().await;
            if !state.store.is_initialized() {
                return ActionResult::without_state(
                    ActionStatus::NotInitialized,
                    "No campaign has been started yet.",
                );
            }
            state.history.add_player(action);
            let prompt = prompts::narration_prompt(&state.history, self.config.prompt_turns, action);
            let options = self
                .config
                .narration
                .clone()
                .with_system_context(state.system_context.clone());
            (prompt, options)
        };
        tracing::debug!(prompt_chars = prompt.len(), "Narrating action");

        let Some(raw) = self.generate(&prompt, &options).await else {
            let state = self.state.lock().await;
            return ActionResult {
                snapshot: Some(state.store.export_state()),
                ..ActionResult::without_state(ActionStatus::Error, APOLOGY)
            };
        };

        let parsed = parse_narration(&raw);
        let signals = parsed.signals;
        let response = if parsed.text.is_empty() {
            tracing::warn!(?signals, "Narration had no visible text");
            QUIET_NARRATION.to_string()
        } else {
            parsed.text
        };
        tracing::debug!(structured = parsed.structured, ?signals, "Narration parsed");

        let (advance, adaptation_context) = {
            let mut state = self.state.lock().await;
            state.store.record_choice(action, response.as_str());

            for objective in &signals.completed_objectives {
                if !state.store.complete_objective(objective) {
                    tracing::debug!(%objective, "Narrator completed an unknown objective");
                }
            }

            let advance = if signals.wants_advance() {
                self.advance(&mut state.store)
            } else {
                None
            };

            let context = (self.config.adapt_every_turn || signals.roadmap_update)
                .then(|| AdaptationContext::capture(&state.store, action, &response));
            (advance, context)
        };

        let decision = match &adaptation_context {
            Some(context) => Some(self.adaptation.adapt(context).await),
            None => None,
        };

        let mut state = self.state.lock().await;
        let adaptation = decision.map(|decision| self.apply_adaptation(&mut state.store, &decision, action));

        state.history.add_narrator(&response);
        state.system_context =
            prompts::system_context(&state.store, &state.character, self.config.structured_signals);

        ActionResult {
            response,
            signals,
            snapshot: Some(state.store.export_state()),
            status: ActionStatus::Ok,
            advance,
            adaptation,
        }
    }

    /// Export everything needed to resume later.
    pub async fn export(&self) -> SessionState {
        let state = self.state.lock().await;
        SessionState {
            campaign_id: state.campaign_id,
            character: state.character.clone(),
            store: state.store.export_state(),
            conversation: state.history.clone(),
        }
    }

    /// Replace the current campaign with a saved one.
    ///
    /// Refused while an action is in flight. On error nothing changes.
    pub async fn restore(&self, saved: SessionState) -> Result<(), OrchestratorError> {
        let _in_flight = self.begin().ok_or(OrchestratorError::Busy)?;

        let mut store = RoadmapStore::new();
        store.import_state(saved.store)?;

        let mut history = saved.conversation;
        history.set_limit(self.config.history_limit);
        let system_context =
            prompts::system_context(&store, &saved.character, self.config.structured_signals);

        let mut state = self.state.lock().await;
        *state = State {
            campaign_id: saved.campaign_id,
            store,
            history,
            character: saved.character,
            system_context,
        };
        tracing::info!(campaign_id = ?state.campaign_id, cursor = ?state.store.cursor(), "Campaign restored");
        Ok(())
    }

    /// One generation call bounded by the configured timeout.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Option<String> {
        match tokio::time::timeout(
            self.config.generation_timeout,
            self.generator.generate(prompt, options),
        )
        .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, backend = self.generator.name(), "Generation failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.generation_timeout,
                    backend = self.generator.name(),
                    "Generation timed out"
                );
                None
            }
        }
    }

    /// Move the cursor once if the policy allows, emitting the matching events.
    fn advance(&self, store: &mut RoadmapStore) -> Option<AdvanceOutcome> {
        if self.config.advance_policy == AdvancePolicy::RequireObjectives {
            if let Some(scene) = store.current_scene() {
                let unmet = scene.unmet_objectives();
                if !unmet.is_empty() {
                    tracing::info!(
                        scene = %scene.title,
                        unmet = unmet.len(),
                        "Advance requested with unmet objectives, holding position"
                    );
                    return None;
                }
            }
        }

        let from = store.cursor();
        let was_complete = store.is_complete();
        let outcome = store.advance_with_outcome();

        match outcome {
            AdvanceOutcome::NextScene(next) => {
                self.events.emit(CampaignEvent::SceneComplete { completed: from, next });
            }
            AdvanceOutcome::NextChapter(next) => {
                self.events.emit(CampaignEvent::SceneComplete { completed: from, next });
                let title = store
                    .current_chapter()
                    .map(|c| c.title.clone())
                    .unwrap_or_default();
                self.events.emit(CampaignEvent::ChapterAdvance {
                    chapter: next.chapter,
                    title,
                });
            }
            AdvanceOutcome::CampaignComplete => {
                if !was_complete {
                    self.events.emit(CampaignEvent::CampaignComplete);
                }
            }
        }
        Some(outcome)
    }

    fn apply_adaptation(
        &self,
        store: &mut RoadmapStore,
        decision: &AdaptationDecision,
        action: &str,
    ) -> AdaptationRecord {
        let (record, emergency) = decision.apply_to(store, action, &self.config.difficulty);
        if let Some(scenario) = emergency {
            self.events.emit(CampaignEvent::EmergencyMode { scenario });
        }
        record
    }

    fn canned_opening(&self, store: &RoadmapStore) -> String {
        let theme = store.roadmap().map(|r| r.theme).unwrap_or_default();
        fallback_opening(theme, &mut rand::thread_rng()).to_string()
    }
}
