//! Integration tests that call the real Anthropic API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p campaign-core --test live_backend -- --ignored --nocapture`
//!
//! These are marked #[ignore] by default to avoid API costs in CI and slow
//! test runs.

use campaign_core::config::EngineConfig;
use campaign_core::narrator::{contains_token, ActionStatus};
use campaign_core::{CampaignSession, CharacterInfo, RoadmapSource};
use std::sync::Arc;
use textgen::Claude;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore]
async fn test_live_campaign_start_and_turn() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let claude = Claude::from_env().expect("Failed to create client");
    let session = CampaignSession::new(Arc::new(claude), EngineConfig::from_env());
    let character = CharacterInfo::new("Thorin")
        .with_class("Fighter")
        .with_background("Soldier");

    let opening = session
        .start("A dragon has burned the border villages of a small kingdom", character)
        .await;
    println!("Roadmap source: {:?}", opening.roadmap_source);
    println!("Opening:\n{}\n", opening.text);

    assert_eq!(opening.status, ActionStatus::Ok);
    assert_ne!(opening.roadmap_source, Some(RoadmapSource::Fallback));
    assert!(!contains_token(&opening.text));

    let roadmap_ok = session
        .inspect(|store, _| {
            store
                .roadmap()
                .is_some_and(|r| r.chapters.iter().all(|c| !c.scenes.is_empty()))
        })
        .await;
    assert!(roadmap_ok);

    let result = session
        .player_action("I ask the village elder where the dragon was last seen")
        .await;
    println!("Narration:\n{}\n", result.response);
    println!("Signals: {:?}", result.signals);

    assert_eq!(result.status, ActionStatus::Ok);
    assert!(!contains_token(&result.response));
    assert!(result.adaptation.is_some());
}
