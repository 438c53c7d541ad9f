//! Save/load tests for the session facade.
//!
//! These run against the mock generator and need no API key.
//! Run with: `cargo test -p campaign-core --test persistence`

use campaign_core::config::EngineConfig;
use campaign_core::persist::{list_saves, manual_save_path, SavedCampaign};
use campaign_core::roadmap::Cursor;
use campaign_core::testing::{assert_ok, TestHarness};
use campaign_core::{CampaignSession, CharacterInfo, SessionError};
use std::sync::Arc;
use tempfile::TempDir;

fn session() -> (CampaignSession, campaign_core::MockGenerator) {
    let mock = TestHarness::fixture_mock();
    let session = CampaignSession::new(Arc::new(mock.clone()), EngineConfig::default());
    (session, mock)
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let save_path = temp_dir.path().join("ember.json");

    let (session, mock) = session();
    session
        .start("Relight the beacon", CharacterInfo::new("Aria").with_class("Ranger"))
        .await;
    mock.push_response("You take the north road. [SCENE_COMPLETE]");
    assert_ok(&session.player_action("I go north").await);

    let metadata = session.save(&save_path).await.expect("Failed to save");
    assert_eq!(metadata.campaign_title, "The Ember Road");
    assert_eq!(metadata.character_name, "Aria");
    assert_eq!(metadata.scene_title.as_deref(), Some("The Old Mill"));

    let peeked = SavedCampaign::peek_metadata(&save_path).await.unwrap();
    assert_eq!(peeked, metadata);

    // A fresh session picks up exactly where the first left off.
    let (restored, restored_mock) = crate::session();
    restored.load(&save_path).await.expect("Failed to load");

    let original_state = session.orchestrator().export().await;
    let restored_state = restored.orchestrator().export().await;
    assert_eq!(restored_state, original_state);

    restored_mock.push_response("The mill falls silent. [CHAPTER_ADVANCE]");
    let result = restored.player_action("I clear the mill").await;
    assert_ok(&result);
    let cursor = restored.inspect(|store, _| store.cursor()).await;
    assert_eq!(cursor, Cursor::new(1, 0));

    let turns = restored.inspect(|_, history| history.len()).await;
    assert_eq!(turns, original_state.conversation.len() + 2);
}

#[tokio::test]
async fn test_save_before_start_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (session, _) = session();

    let result = session.save(temp_dir.path().join("empty.json")).await;
    assert!(matches!(result, Err(SessionError::NotStarted)));
}

#[tokio::test]
async fn test_load_missing_file_leaves_state_alone() {
    let temp_dir = TempDir::new().unwrap();
    let (session, _) = session();
    session.start("Relight the beacon", CharacterInfo::new("Aria")).await;
    let before = session.orchestrator().export().await;

    let result = session.load(temp_dir.path().join("missing.json")).await;

    assert!(matches!(result, Err(SessionError::Persist(_))));
    assert_eq!(session.orchestrator().export().await, before);
}

#[tokio::test]
async fn test_auto_and_manual_saves_are_listed() {
    let temp_dir = TempDir::new().unwrap();
    let (session, _) = session();
    session.start("Relight the beacon", CharacterInfo::new("Aria")).await;

    let auto = session.auto_save(temp_dir.path()).await.unwrap();
    assert!(auto.ends_with("The_Ember_Road_autosave.json"));

    let manual = manual_save_path(temp_dir.path(), "The Ember Road");
    session.save(&manual).await.unwrap();

    let saves = list_saves(temp_dir.path()).await.unwrap();
    assert_eq!(saves.len(), 2);
    assert!(saves.iter().all(|s| s.metadata.campaign_title == "The Ember Road"));
    assert!(saves[0].metadata.saved_at >= saves[1].metadata.saved_at);
}
