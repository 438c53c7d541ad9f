//! Testing utilities for the narrative engine.
//!
//! This module provides tools for integration testing:
//! - `MockGenerator` for deterministic generation without API calls
//! - `TestHarness` for scripted campaign scenarios
//! - Assertion helpers for verifying campaign state

use crate::analyzer::CharacterInfo;
use crate::config::EngineConfig;
use crate::narrator::{contains_token, ActionResult, ActionStatus, NarrativeOrchestrator, Opening};
use crate::roadmap::{Cursor, StoreSnapshot};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use textgen::{Error, GenerationOptions, TextGenerator};
use tokio::sync::Notify;

/// Text found only in roadmap requests.
pub const ROADMAP_REQUEST_MARKER: &str = "Design a campaign roadmap";
/// Text found only in adaptation requests.
pub const ADAPTATION_REQUEST_MARKER: &str = "Decide whether the campaign plan";
/// Text found only in opening requests.
pub const OPENING_REQUEST_MARKER: &str = "Write the opening of the campaign";

const DEFAULT_RESPONSE: &str = "The story continues.";

/// A small two-chapter roadmap used by `TestHarness`.
///
/// Chapter 1 has scenes "The Crossroads" and "The Old Mill"; chapter 2 has
/// the single climax "The Tower Top".
pub const FIXTURE_ROADMAP: &str = r#"{
  "title": "The Ember Road",
  "theme": "heroic",
  "overallGoal": "Relight the beacon on Ember Tower",
  "estimatedSessions": 2,
  "difficultyProgression": "gradual",
  "chapters": [
    {
      "title": "The Road North",
      "description": "Leaving the valley behind",
      "objectives": ["Reach the mill"],
      "scenes": [
        {"title": "The Crossroads", "description": "Three roads meet", "type": "story", "difficulty": 2,
         "objectives": ["Choose a road"], "choices": ["North", "East"]},
        {"title": "The Old Mill", "description": "Something moves inside", "type": "combat", "difficulty": 4,
         "objectives": ["Clear the mill"]}
      ]
    },
    {
      "title": "Ember Tower",
      "description": "The final climb",
      "scenes": [
        {"title": "The Tower Top", "description": "Wind and fire", "type": "climax", "difficulty": 8}
      ]
    }
  ],
  "npcs": [
    {"name": "Warden Ilse", "role": "questGiver", "description": "Keeper of the beacon"}
  ],
  "plotThreads": [
    {"title": "The Dark Beacon", "description": "Why did the fire go out?", "status": "active"}
  ],
  "emergencyScenarios": [
    {"title": "Ambush at Dusk", "description": "Bandits block the road", "type": "combat", "difficulty": 4}
  ]
}"#;

/// One recorded call to the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub prompt: String,
    pub system_context: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
}

#[derive(Default)]
struct MockState {
    /// Responses for prompts containing a marker, reused on every match.
    routes: Vec<(String, Result<String, Error>)>,
    /// Responses for everything else, returned in order.
    script: VecDeque<Result<String, Error>>,
    default_response: Option<String>,
    gate: Option<Arc<Notify>>,
    calls: Vec<MockCall>,
}

/// A generator that returns scripted responses.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the engine owns another.
#[derive(Clone, Default)]
pub struct MockGenerator {
    state: Arc<Mutex<MockState>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unrouted call.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push_response(text);
        self
    }

    /// Queue a failure for the next unrouted call.
    pub fn with_failure(self, error: Error) -> Self {
        self.lock().script.push_back(Err(error));
        self
    }

    /// Response for unrouted calls once the script runs out.
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        self.lock().default_response = Some(text.into());
        self
    }

    /// Answer every prompt containing `marker` with `text`.
    pub fn with_route(self, marker: impl Into<String>, text: impl Into<String>) -> Self {
        self.lock().routes.push((marker.into(), Ok(text.into())));
        self
    }

    /// Fail every prompt containing `marker`.
    pub fn with_failing_route(self, marker: impl Into<String>, error: Error) -> Self {
        self.lock().routes.push((marker.into(), Err(error)));
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.lock().script.push_back(Ok(text.into()));
    }

    pub fn push_failure(&self, error: Error) {
        self.lock().script.push_back(Err(error));
    }

    /// Make every call wait for a permit on `gate` before answering.
    pub fn set_gate(&self, gate: Arc<Notify>) {
        self.lock().gate = Some(gate);
    }

    pub fn clear_gate(&self) {
        self.lock().gate = None;
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls whose prompt contains `marker`.
    pub fn calls_matching(&self, marker: &str) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.prompt.contains(marker))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, prompt: &str, options: &GenerationOptions) -> Option<Arc<Notify>> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            prompt: prompt.to_string(),
            system_context: options.system_context.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        });
        state.gate.clone()
    }

    fn respond(&self, prompt: &str) -> Result<String, Error> {
        let mut state = self.lock();
        if let Some((_, response)) = state.routes.iter().find(|(m, _)| prompt.contains(m.as_str())) {
            return response.clone();
        }
        match state.script.pop_front() {
            Some(response) => response,
            None => Ok(state
                .default_response
                .clone()
                .unwrap_or_else(|| DEFAULT_RESPONSE.to_string())),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, Error> {
        // Logged before the gate so tests can see a call is parked.
        if let Some(gate) = self.record(prompt, options) {
            gate.notified().await;
        }
        self.respond(prompt)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Test harness for running campaign scenarios.
///
/// Roadmap requests are answered with [`FIXTURE_ROADMAP`], adaptation
/// requests with an empty decision, and the opening with a fixed paragraph.
/// Narration is scripted with [`TestHarness::expect_narration`].
pub struct TestHarness {
    pub mock: MockGenerator,
    pub orchestrator: NarrativeOrchestrator,
    pub character: CharacterInfo,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mock = Self::fixture_mock();
        Self::with_mock(mock, config)
    }

    /// Use a custom mock. Routes are not added.
    pub fn with_mock(mock: MockGenerator, config: EngineConfig) -> Self {
        let orchestrator = NarrativeOrchestrator::new(Arc::new(mock.clone()), config);
        Self {
            mock,
            orchestrator,
            character: CharacterInfo::new("Test Hero").with_class("Fighter"),
        }
    }

    /// The mock the default harness uses.
    pub fn fixture_mock() -> MockGenerator {
        MockGenerator::new()
            .with_route(ROADMAP_REQUEST_MARKER, FIXTURE_ROADMAP)
            .with_route(ADAPTATION_REQUEST_MARKER, "{}")
            .with_route(
                OPENING_REQUEST_MARKER,
                "Smoke curls from the valley chimneys as the beacon stays dark.",
            )
    }

    /// Queue the narrator's next reply.
    pub fn expect_narration(&self, text: impl Into<String>) -> &Self {
        self.mock.push_response(text);
        self
    }

    /// Queue a narration failure.
    pub fn expect_failure(&self, error: Error) -> &Self {
        self.mock.push_failure(error);
        self
    }

    pub async fn start(&self) -> Opening {
        self.start_with("Relight the beacon").await
    }

    pub async fn start_with(&self, prompt: &str) -> Opening {
        self.orchestrator.initialize(prompt, self.character.clone()).await
    }

    pub async fn act(&self, action: &str) -> ActionResult {
        self.orchestrator.process_player_action(action).await
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.orchestrator.snapshot().await
    }

    pub async fn cursor(&self) -> Cursor {
        self.orchestrator.inspect(|store, _| store.cursor()).await
    }

    pub async fn current_scene_title(&self) -> Option<String> {
        self.orchestrator
            .inspect(|store, _| store.current_scene().map(|s| s.title.clone()))
            .await
    }

    pub async fn choice_count(&self) -> usize {
        self.orchestrator.inspect(|store, _| store.choices().len()).await
    }

    pub async fn adaptation_count(&self) -> usize {
        self.orchestrator
            .inspect(|store, _| store.adaptations().len())
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the turn succeeded.
#[track_caller]
pub fn assert_ok(result: &ActionResult) {
    assert_eq!(
        result.status,
        ActionStatus::Ok,
        "Expected Ok, got {:?}: {}",
        result.status,
        result.response
    );
}

/// Assert the cursor in a turn's snapshot.
#[track_caller]
pub fn assert_cursor(result: &ActionResult, chapter: usize, scene: usize) {
    let snapshot = result
        .snapshot
        .as_ref()
        .unwrap_or_else(|| panic!("Expected a snapshot, turn was {:?}", result.status));
    let actual = (snapshot.progress.current_chapter, snapshot.progress.current_scene);
    assert_eq!(
        actual,
        (chapter, scene),
        "Expected cursor ({chapter}, {scene}), got {actual:?}"
    );
}

/// Assert that no reserved token survived into player-visible text.
#[track_caller]
pub fn assert_clean(text: &str) {
    assert!(!contains_token(text), "Control token leaked into text: {text}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_script_then_default() {
        let mock = MockGenerator::new()
            .with_response("first")
            .with_default_response("again");
        let options = GenerationOptions::new().with_temperature(0.5);

        assert_eq!(mock.generate("a", &options).await.unwrap(), "first");
        assert_eq!(mock.generate("b", &options).await.unwrap(), "again");
        assert_eq!(mock.generate("c", &options).await.unwrap(), "again");

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].prompt, "b");
        assert_eq!(calls[1].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn test_routes_take_priority() {
        let mock = MockGenerator::new()
            .with_response("scripted")
            .with_route("roadmap", "routed")
            .with_failing_route("explode", Error::EmptyResponse);
        let options = GenerationOptions::new();

        assert_eq!(mock.generate("a roadmap please", &options).await.unwrap(), "routed");
        assert_eq!(mock.generate("a roadmap again", &options).await.unwrap(), "routed");
        assert!(mock.generate("explode now", &options).await.is_err());
        assert_eq!(mock.generate("narrate", &options).await.unwrap(), "scripted");
        assert_eq!(mock.calls_matching("roadmap").len(), 2);
    }

    #[tokio::test]
    async fn test_harness_start() {
        let harness = TestHarness::new();
        let opening = harness.start().await;

        assert_eq!(opening.status, ActionStatus::Ok);
        assert!(opening.generated);
        assert_eq!(harness.cursor().await, Cursor::new(0, 0));
        assert_eq!(
            harness.current_scene_title().await.as_deref(),
            Some("The Crossroads")
        );
    }
}
