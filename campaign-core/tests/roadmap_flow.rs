//! Scenario tests for the narrative loop, run against the mock generator.
//!
//! Run with: `cargo test -p campaign-core --test roadmap_flow`

use campaign_core::analyzer::{classify_theme, fallback_roadmap, CharacterInfo};
use campaign_core::config::{AdvancePolicy, EngineConfig};
use campaign_core::events::CampaignEvent;
use campaign_core::narrator::{
    contains_token, ActionStatus, APOLOGY, QUIET_NARRATION, SIGNAL_TOKENS,
};
use campaign_core::roadmap::{
    AdvanceOutcome, Chapter, Cursor, DecisionSource, DifficultyTable, NpcRole, Roadmap,
    RoadmapStore, Scene, SceneType, Theme,
};
use campaign_core::testing::{
    assert_clean, assert_cursor, assert_ok, MockGenerator, TestHarness, ADAPTATION_REQUEST_MARKER,
    FIXTURE_ROADMAP, OPENING_REQUEST_MARKER, ROADMAP_REQUEST_MARKER,
};
use campaign_core::RoadmapSource;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;

fn drain(rx: &mut Receiver<CampaignEvent>) -> Vec<CampaignEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn two_by_two() -> Roadmap {
    Roadmap {
        title: "Two Roads".to_string(),
        theme: Theme::Heroic,
        overall_goal: "Get home".to_string(),
        estimated_sessions: 2,
        difficulty_progression: Default::default(),
        chapters: vec![
            Chapter::new("First", "")
                .with_scene(Scene::new("A", "", SceneType::Story, 2))
                .with_scene(Scene::new("B", "", SceneType::Social, 3)),
            Chapter::new("Second", "")
                .with_scene(Scene::new("C", "", SceneType::Combat, 5))
                .with_scene(Scene::new("D", "", SceneType::Climax, 8)),
        ],
        npcs: Vec::new(),
        locations: Vec::new(),
        plot_threads: Vec::new(),
        emergency_scenarios: Vec::new(),
    }
}

// =============================================================================
// Roadmap store
// =============================================================================

#[test]
fn test_advance_walks_two_by_two_roadmap() {
    let mut store = RoadmapStore::from_roadmap(two_by_two()).unwrap();
    assert_eq!(store.cursor(), Cursor::new(0, 0));

    assert!(store.advance());
    assert_eq!(store.cursor(), Cursor::new(0, 1));
    assert!(store.advance());
    assert_eq!(store.cursor(), Cursor::new(1, 0));
    assert!(store.advance());
    assert_eq!(store.cursor(), Cursor::new(1, 1));

    assert!(!store.advance());
    assert_eq!(store.cursor(), Cursor::new(1, 1));
    assert!(!store.advance());
    assert_eq!(store.cursor(), Cursor::new(1, 1));
    assert!(store.is_complete());
}

#[test]
fn test_export_import_preserves_advance_behavior() {
    let mut original = RoadmapStore::from_roadmap(two_by_two()).unwrap();
    original.advance();
    original.record_choice("I wave", "They wave back");

    let mut restored = RoadmapStore::new();
    let json = serde_json::to_string(&original.export_state()).unwrap();
    restored
        .import_state(serde_json::from_str(&json).unwrap())
        .unwrap();

    assert_eq!(restored.cursor(), original.cursor());
    assert_eq!(restored.roadmap(), original.roadmap());
    assert_eq!(restored.choices(), original.choices());
    for _ in 0..4 {
        assert_eq!(restored.advance_with_outcome(), original.advance_with_outcome());
        assert_eq!(restored.cursor(), original.cursor());
    }
}

// =============================================================================
// Fallback analysis
// =============================================================================

#[test]
fn test_dark_dragon_prompt_fallback() {
    let prompt = "A dark curse threatens a kingdom, with a dragon guarding treasure";
    let roadmap = fallback_roadmap(prompt, &CharacterInfo::new("Aria"), &DifficultyTable::default());

    assert_eq!(roadmap.theme, Theme::Dark);
    assert!(roadmap.overall_goal.to_lowercase().contains("dragon"));
    assert!(roadmap.npcs.iter().any(|n| n.role == NpcRole::Antagonist));
}

#[test]
fn test_theme_classification_is_deterministic() {
    let prompts = [
        "A dark curse threatens a kingdom",
        "Who murdered the duke? A mystery in the capital",
        "Explore the uncharted islands",
        "",
    ];
    for prompt in prompts {
        let lower = prompt.to_lowercase();
        let first = classify_theme(&lower);
        for _ in 0..5 {
            assert_eq!(classify_theme(&lower), first, "{prompt}");
        }
    }
}

#[test]
fn test_fallback_roadmaps_are_never_empty() {
    let character = CharacterInfo::new("Aria");
    let table = DifficultyTable::default();
    for prompt in ["", "dungeon", "forest dragon", "political intrigue at court", "horror"] {
        let roadmap = fallback_roadmap(prompt, &character, &table);
        assert!(!roadmap.chapters.is_empty());
        assert!(roadmap.chapters.iter().all(|c| !c.scenes.is_empty()));
    }
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_initialize_uses_generated_roadmap() {
    let harness = TestHarness::new();
    let mut events = harness.orchestrator.subscribe();

    let opening = harness.start().await;

    assert_eq!(opening.status, ActionStatus::Ok);
    assert_eq!(opening.roadmap_source, Some(RoadmapSource::Generated));
    assert!(opening.generated);
    assert!(opening.text.contains("beacon"));
    assert!(harness.orchestrator.campaign_id().await.is_some());

    let conversation = harness.orchestrator.conversation().await;
    assert_eq!(conversation.len(), 1);

    assert_eq!(
        drain(&mut events),
        vec![CampaignEvent::CampaignStarted {
            title: "The Ember Road".to_string(),
            theme: Theme::Heroic,
        }]
    );
}

#[tokio::test]
async fn test_initialize_survives_total_backend_failure() {
    let mock = MockGenerator::new()
        .with_failing_route(ROADMAP_REQUEST_MARKER, textgen::Error::Network("down".into()))
        .with_failing_route(OPENING_REQUEST_MARKER, textgen::Error::Network("down".into()));
    let harness = TestHarness::with_mock(mock, EngineConfig::default());

    let opening = harness
        .start_with("A dark curse threatens a kingdom, with a dragon guarding treasure")
        .await;

    assert_eq!(opening.status, ActionStatus::Ok);
    assert_eq!(opening.roadmap_source, Some(RoadmapSource::Fallback));
    assert!(!opening.generated);
    assert!(!opening.text.is_empty());
    let theme = harness
        .orchestrator
        .inspect(|store, _| store.roadmap().map(|r| r.theme))
        .await;
    assert_eq!(theme, Some(Theme::Dark));
}

#[tokio::test]
async fn test_action_before_initialize() {
    let harness = TestHarness::new();
    let result = harness.act("I look around").await;

    assert_eq!(result.status, ActionStatus::NotInitialized);
    assert!(result.snapshot.is_none());
    assert_eq!(harness.mock.call_count(), 0);
}

// =============================================================================
// Player actions
// =============================================================================

#[tokio::test]
async fn test_plain_action_records_choice_and_adaptation() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.expect_narration("The crossroads are quiet. A crow watches you.");

    let result = harness.act("I read the signpost").await;

    assert_ok(&result);
    assert_eq!(result.response, "The crossroads are quiet. A crow watches you.");
    assert!(result.advance.is_none());
    assert_cursor(&result, 0, 0);
    assert_eq!(harness.choice_count().await, 1);
    assert_eq!(harness.adaptation_count().await, 1);
    assert_eq!(
        result.adaptation.map(|a| a.source),
        Some(DecisionSource::Structured)
    );

    let narration = harness
        .mock
        .calls()
        .into_iter()
        .find(|c| c.prompt.contains("## Player Action"))
        .unwrap();
    assert!(narration.prompt.contains("I read the signpost"));
    let context = narration.system_context.unwrap();
    assert!(context.contains("The Crossroads"));
    assert!(context.contains("Test Hero"));
}

#[tokio::test]
async fn test_chapter_advance_token_is_stripped() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.expect_narration(
        "[CHAPTER_ADVANCE]You leave the mill [ROLL_DICE]behind.[SCENE_[ROADMAP_UPDATE]COMPLETE]",
    );

    let result = harness.act("I head north").await;

    assert_ok(&result);
    assert_clean(&result.response);
    for token in SIGNAL_TOKENS {
        assert!(!result.response.contains(token));
    }
    assert!(result.signals.chapter_advance);
    assert!(result.signals.roll_dice);
    assert!(result.signals.roadmap_update);

    let conversation = harness.orchestrator.conversation().await;
    assert!(conversation.turns().all(|t| !contains_token(&t.text)));
}

#[tokio::test]
async fn test_scene_and_chapter_transitions_emit_events() {
    let harness = TestHarness::new();
    harness.start().await;
    let mut events = harness.orchestrator.subscribe();

    harness.expect_narration("You choose the north road. [SCENE_COMPLETE]");
    let result = harness.act("I go north").await;
    assert_eq!(result.advance, Some(AdvanceOutcome::NextScene(Cursor::new(0, 1))));
    assert_cursor(&result, 0, 1);

    harness.expect_narration("The mill is cleared. [CHAPTER_ADVANCE]");
    let result = harness.act("I fight").await;
    assert_eq!(result.advance, Some(AdvanceOutcome::NextChapter(Cursor::new(1, 0))));
    assert_cursor(&result, 1, 0);

    assert_eq!(
        drain(&mut events),
        vec![
            CampaignEvent::SceneComplete {
                completed: Cursor::new(0, 0),
                next: Cursor::new(0, 1),
            },
            CampaignEvent::SceneComplete {
                completed: Cursor::new(0, 1),
                next: Cursor::new(1, 0),
            },
            CampaignEvent::ChapterAdvance {
                chapter: 1,
                title: "Ember Tower".to_string(),
            },
        ]
    );

    harness.expect_narration("The beacon blazes. [SCENE_COMPLETE]");
    let result = harness.act("I light the beacon").await;
    assert_eq!(result.advance, Some(AdvanceOutcome::CampaignComplete));
    assert_cursor(&result, 1, 0);
    assert!(result.snapshot.as_ref().unwrap().progress.completed);
    assert_eq!(drain(&mut events), vec![CampaignEvent::CampaignComplete]);

    harness.expect_narration("Dawn breaks. [SCENE_COMPLETE]");
    let result = harness.act("I rest").await;
    assert_eq!(result.advance, Some(AdvanceOutcome::CampaignComplete));
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_both_advance_signals_advance_once() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.expect_narration("Onward. [SCENE_COMPLETE] [CHAPTER_ADVANCE]");

    let result = harness.act("I march").await;

    assert_cursor(&result, 0, 1);
}

#[tokio::test]
async fn test_signal_only_reply_still_narrates() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.expect_narration("[SCENE_COMPLETE]");

    let result = harness.act("I take the north road").await;

    assert_ok(&result);
    assert_eq!(result.response, QUIET_NARRATION);
    assert!(result.signals.scene_complete);
    assert_cursor(&result, 0, 1);

    let conversation = harness.orchestrator.conversation().await;
    let last = conversation.turns().last().unwrap();
    assert_eq!(last.text, QUIET_NARRATION);
}

#[tokio::test]
async fn test_failed_adaptation_is_still_recorded() {
    let mock = MockGenerator::new()
        .with_route(ROADMAP_REQUEST_MARKER, FIXTURE_ROADMAP)
        .with_route(OPENING_REQUEST_MARKER, "The road is long.")
        .with_failing_route(
            ADAPTATION_REQUEST_MARKER,
            textgen::Error::Network("connection reset".into()),
        )
        .with_default_response("The stranger nods.");
    let harness = TestHarness::with_mock(mock, EngineConfig::default());
    harness.start().await;
    let before = harness.snapshot().await;

    let result = harness.act("I greet the stranger").await;

    assert_ok(&result);
    assert_eq!(result.response, "The stranger nods.");
    let record = result.adaptation.unwrap();
    assert_eq!(record.source, DecisionSource::Failed);
    assert!(!record.changed_anything());
    assert_eq!(harness.adaptation_count().await, 1);
    assert_eq!(harness.snapshot().await.roadmap, before.roadmap);
}

#[tokio::test]
async fn test_generation_failure_returns_apology() {
    let harness = TestHarness::new();
    harness.start().await;
    let before = harness.snapshot().await;
    harness.expect_failure(textgen::Error::Network("connection reset".into()));

    let result = harness.act("I draw my sword").await;

    assert!(result.is_error());
    assert_eq!(result.response, APOLOGY);
    let after = result.snapshot.unwrap();
    assert_eq!(after.progress, before.progress);
    assert_eq!(after.roadmap, before.roadmap);
    assert_eq!(harness.choice_count().await, 0);
    assert_eq!(harness.adaptation_count().await, 0);

    // The orchestrator recovers on the next turn.
    harness.expect_narration("You steady yourself.");
    assert_ok(&harness.act("I try again").await);
}

#[tokio::test]
async fn test_concurrent_action_is_rejected() {
    let harness = TestHarness::new();
    harness.start().await;
    let calls_before = harness.mock.call_count();

    let gate = Arc::new(Notify::new());
    harness.mock.set_gate(gate.clone());
    harness.expect_narration("The door swings open. [SCENE_COMPLETE]");

    let first = harness.act("I push the door");
    let second = async {
        while harness.mock.call_count() == calls_before {
            tokio::task::yield_now().await;
        }
        assert!(harness.orchestrator.is_processing());

        let snapshot = harness.snapshot().await;
        let conversation = harness.orchestrator.conversation().await;

        let busy = harness.act("I also kick the door").await;

        assert_eq!(harness.snapshot().await, snapshot);
        assert_eq!(harness.orchestrator.conversation().await, conversation);

        harness.mock.clear_gate();
        gate.notify_one();
        busy
    };

    let (first, busy) = tokio::join!(first, second);

    assert!(busy.is_busy());
    assert!(busy.snapshot.is_none());
    assert_ok(&first);
    assert_cursor(&first, 0, 1);
    assert!(!harness.orchestrator.is_processing());
    assert_eq!(harness.choice_count().await, 1);
}

#[tokio::test]
async fn test_require_objectives_blocks_advance() {
    let config = EngineConfig::default().with_advance_policy(AdvancePolicy::RequireObjectives);
    let harness = TestHarness::with_config(config);
    harness.start().await;

    harness.expect_narration("You dither at the signpost. [SCENE_COMPLETE]");
    let result = harness.act("I wait").await;
    assert!(result.advance.is_none());
    assert_cursor(&result, 0, 0);

    harness.expect_narration(
        "You pick the north road.\n```signals\n{\"sceneComplete\": true, \"completedObjectives\": [\"Choose a road\"]}\n```",
    );
    let result = harness.act("I choose north").await;
    assert_eq!(result.advance, Some(AdvanceOutcome::NextScene(Cursor::new(0, 1))));
    assert_eq!(result.response, "You pick the north road.");
}

#[tokio::test]
async fn test_emergency_inserts_scene_after_current() {
    let mock = MockGenerator::new()
        .with_route(ROADMAP_REQUEST_MARKER, FIXTURE_ROADMAP)
        .with_route(OPENING_REQUEST_MARKER, "The road is long.")
        .with_route(ADAPTATION_REQUEST_MARKER, r#"{"emergency": true}"#)
        .with_default_response("The hills are empty.");
    let harness = TestHarness::with_mock(mock, EngineConfig::default());
    harness.start().await;
    let mut events = harness.orchestrator.subscribe();

    let result = harness.act("I wander into the hills").await;

    assert_ok(&result);
    assert!(result.adaptation.as_ref().unwrap().emergency);
    assert_cursor(&result, 0, 0);
    let titles: Vec<String> = result.snapshot.unwrap().roadmap.unwrap().chapters[0]
        .scenes
        .iter()
        .map(|s| s.title.clone())
        .collect();
    assert_eq!(titles, vec!["The Crossroads", "Ambush at Dusk", "The Old Mill"]);
    assert_eq!(
        drain(&mut events),
        vec![CampaignEvent::EmergencyMode {
            scenario: "Ambush at Dusk".to_string(),
        }]
    );

    // Only one scenario exists; a second request inserts nothing.
    let result = harness.act("I wander further").await;
    assert!(!result.adaptation.unwrap().emergency);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_adaptation_only_on_update_signal() {
    let config = EngineConfig::default().with_adapt_every_turn(false);
    let harness = TestHarness::with_config(config);
    harness.start().await;

    harness.expect_narration("Nothing much happens.");
    let result = harness.act("I wait").await;
    assert!(result.adaptation.is_none());
    assert!(harness.mock.calls_matching(ADAPTATION_REQUEST_MARKER).is_empty());

    harness.expect_narration("The world shifts. [ROADMAP_UPDATE]");
    let result = harness.act("I burn the map").await;
    assert!(result.adaptation.is_some());
    assert_eq!(harness.mock.calls_matching(ADAPTATION_REQUEST_MARKER).len(), 1);
    assert_eq!(harness.adaptation_count().await, 1);
}

#[tokio::test]
async fn test_coarse_adaptation_fallback() {
    let mock = MockGenerator::new()
        .with_route(ROADMAP_REQUEST_MARKER, FIXTURE_ROADMAP)
        .with_route(OPENING_REQUEST_MARKER, "The road is long.")
        .with_route(
            ADAPTATION_REQUEST_MARKER,
            "The scene should change and a new plot hook appears.",
        )
        .with_default_response("The stranger smiles.");
    let harness = TestHarness::with_mock(mock, EngineConfig::default());
    harness.start().await;

    let result = harness.act("I befriend the stranger").await;

    let record = result.adaptation.unwrap();
    assert_eq!(record.source, DecisionSource::Coarse);
    assert!(record.scene_modified);
    assert_eq!(record.plot_threads_updated, 1);
}
