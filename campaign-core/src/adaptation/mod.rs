//! Adaptation: bending the roadmap around what the player actually does.
//!
//! Adaptation is best-effort. A failed or slow backend yields an empty
//! decision and play goes on; the attempt is still logged on the store.

mod decision;

pub use decision::{AdaptationDecision, PLAYER_INFLUENCE_THREAD};

use crate::config::EngineConfig;
use crate::roadmap::{ChoiceRecord, Cursor, DecisionSource, RoadmapStore, SceneType};
use crate::text::truncate_chars;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use textgen::{GenerationOptions, TextGenerator};

const RECENT_CHOICES: usize = 3;
const UPCOMING_SCENES: usize = 3;
const OPEN_THREADS: usize = 3;
const MAX_RESULT_CHARS: usize = 600;

/// A scene that lies ahead of the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingScene {
    pub position: Cursor,
    pub title: String,
    pub scene_type: SceneType,
}

/// Everything the adaptation request needs, copied out of the store so the
/// request can run without holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationContext {
    pub action: String,
    pub result: String,
    pub chapter_title: String,
    pub scene_title: String,
    pub current_objectives: Vec<String>,
    pub recent_choices: Vec<ChoiceRecord>,
    pub upcoming: Vec<UpcomingScene>,
    /// Title and status name of open threads.
    pub open_threads: Vec<(String, &'static str)>,
}

impl AdaptationContext {
    pub fn capture(store: &RoadmapStore, action: &str, result: &str) -> Self {
        let open_threads = store
            .roadmap()
            .map(|r| {
                r.open_threads()
                    .take(OPEN_THREADS)
                    .map(|t| (t.title.clone(), t.status.name()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            action: action.to_string(),
            result: result.to_string(),
            chapter_title: store
                .current_chapter()
                .map(|c| c.title.clone())
                .unwrap_or_default(),
            scene_title: store
                .current_scene()
                .map(|s| s.title.clone())
                .unwrap_or_default(),
            current_objectives: store
                .current_scene()
                .map(|s| s.objectives.clone())
                .unwrap_or_default(),
            recent_choices: store.recent_choices(RECENT_CHOICES).to_vec(),
            upcoming: store
                .upcoming_scenes(UPCOMING_SCENES)
                .into_iter()
                .map(|(position, scene)| UpcomingScene {
                    position,
                    title: scene.title.clone(),
                    scene_type: scene.scene_type,
                })
                .collect(),
            open_threads,
        }
    }

    /// Render as the prompt body for an adaptation request.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Where we are");
        let _ = writeln!(out, "Chapter: {}", self.chapter_title);
        let _ = writeln!(out, "Scene: {}", self.scene_title);
        if self.current_objectives.is_empty() {
            let _ = writeln!(out, "Objectives: none");
        } else {
            let _ = writeln!(out, "Objectives: {}", self.current_objectives.join("; "));
        }

        if !self.recent_choices.is_empty() {
            let _ = writeln!(out, "\n## Recent choices");
            for choice in &self.recent_choices {
                let _ = writeln!(out, "- {}", choice.action);
            }
        }

        if !self.upcoming.is_empty() {
            let _ = writeln!(out, "\n## Coming up");
            for scene in &self.upcoming {
                let _ = writeln!(
                    out,
                    "- {} ({}, chapter {})",
                    scene.title,
                    scene.scene_type.name(),
                    scene.position.chapter + 1
                );
            }
        }

        if !self.open_threads.is_empty() {
            let _ = writeln!(out, "\n## Open plot threads");
            for (title, status) in &self.open_threads {
                let _ = writeln!(out, "- {title} [{status}]");
            }
        }

        let _ = writeln!(out, "\n## This turn");
        let _ = writeln!(out, "Player: {}", self.action);
        let _ = writeln!(out, "Narrator: {}", truncate_chars(&self.result, MAX_RESULT_CHARS));
        out
    }
}

/// Asks the backend how the roadmap should change after a turn.
pub struct AdaptationEngine {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    timeout: Duration,
}

impl AdaptationEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &EngineConfig) -> Self {
        Self {
            generator,
            options: config.adaptation.clone(),
            timeout: config.generation_timeout,
        }
    }

    /// Decide how to adapt. Never fails: a backend error or timeout gives an
    /// empty decision marked `Failed`.
    pub async fn adapt(&self, context: &AdaptationContext) -> AdaptationDecision {
        let mut request = String::from(include_str!("prompts/adaptation_request.txt"));
        request.push('\n');
        request.push_str(&context.summary());

        let reply = match tokio::time::timeout(
            self.timeout,
            self.generator.generate(&request, &self.options),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Adaptation request failed, skipping");
                return AdaptationDecision::none(DecisionSource::Failed);
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Adaptation request timed out, skipping");
                return AdaptationDecision::none(DecisionSource::Failed);
            }
        };

        let decision = AdaptationDecision::from_reply(&reply, &context.action);
        tracing::debug!(source = ?decision.source, empty = decision.is_empty(), "Adaptation decided");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::{Chapter, Roadmap, Scene, Theme};
    use crate::testing::MockGenerator;

    fn store() -> RoadmapStore {
        let roadmap = Roadmap {
            title: "Test".to_string(),
            theme: Theme::Heroic,
            overall_goal: "Win".to_string(),
            estimated_sessions: 2,
            difficulty_progression: Default::default(),
            chapters: vec![
                Chapter::new("One", "").with_scene(
                    Scene::new("Gate", "", SceneType::Story, 2).with_objective("Open the gate"),
                ),
                Chapter::new("Two", "")
                    .with_scene(Scene::new("Hall", "", SceneType::Combat, 5))
                    .with_scene(Scene::new("Vault", "", SceneType::Puzzle, 5)),
            ],
            npcs: Vec::new(),
            locations: Vec::new(),
            plot_threads: Vec::new(),
            emergency_scenarios: Vec::new(),
        };
        RoadmapStore::from_roadmap(roadmap).unwrap()
    }

    #[test]
    fn test_context_capture() {
        let mut store = store();
        for action in ["one", "two", "three", "four"] {
            store.record_choice(action, "ok");
        }
        let context = AdaptationContext::capture(&store, "five", "the gate creaks");

        assert_eq!(context.current_objectives, vec!["Open the gate"]);
        let actions: Vec<_> = context.recent_choices.iter().map(|c| c.action.as_str()).collect();
        assert_eq!(actions, vec!["two", "three", "four"]);
        let upcoming: Vec<_> = context.upcoming.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(upcoming, vec!["Hall", "Vault"]);

        let summary = context.summary();
        assert!(summary.contains("Scene: Gate"));
        assert!(summary.contains("- Hall (combat, chapter 2)"));
        assert!(summary.contains("Player: five"));
    }

    #[tokio::test]
    async fn test_failed_generation_is_silent_noop() {
        let mock = MockGenerator::new().with_failure(textgen::Error::Timeout(Duration::from_secs(1)));
        let engine = AdaptationEngine::new(Arc::new(mock), &EngineConfig::default());
        let store = store();

        let decision = engine
            .adapt(&AdaptationContext::capture(&store, "I wait", "Nothing happens"))
            .await;

        assert!(decision.is_empty());
        assert_eq!(decision.source, DecisionSource::Failed);
    }

    #[tokio::test]
    async fn test_request_includes_context() {
        let mock = MockGenerator::new().with_response(r#"{"emergency": false}"#);
        let engine = AdaptationEngine::new(Arc::new(mock.clone()), &EngineConfig::default());
        let store = store();

        let decision = engine
            .adapt(&AdaptationContext::capture(&store, "I knock", "Silence"))
            .await;

        assert_eq!(decision.source, DecisionSource::Structured);
        assert!(decision.is_empty());
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Player: I knock"));
        assert_eq!(calls[0].temperature, Some(0.3));
    }
}
