//! Campaign roadmap planner and adaptive narrative engine.
//!
//! This crate provides:
//! - Roadmap generation from a free-text premise, with a deterministic
//!   keyword fallback when the backend is unavailable
//! - A cursor-owning roadmap store with bounded, validated modifications
//! - An adaptation engine that revises the plan after each player action
//! - A single-flight narrative orchestrator that turns actions into
//!   narration and control signals
//! - Campaign persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use campaign_core::{CampaignSession, CharacterInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = CampaignSession::from_env();
//!     let character = CharacterInfo::new("Aria").with_class("Ranger");
//!
//!     let opening = session.start("A dragon threatens the northern kingdom", character).await;
//!     println!("{}", opening.text);
//!
//!     let result = session.player_action("I ride for the mountains").await;
//!     println!("{}", result.response);
//!
//!     session.save("my_campaign.json").await?;
//!     Ok(())
//! }
//! ```

pub mod adaptation;
pub mod analyzer;
pub mod config;
pub mod events;
pub mod narrator;
pub mod persist;
pub mod roadmap;
pub mod session;
pub mod testing;

mod text;

// Primary public API
pub use analyzer::{CampaignAnalyzer, CharacterInfo, RoadmapSource};
pub use config::{AdvancePolicy, EngineConfig};
pub use events::{CampaignEvent, EventBus};
pub use narrator::{ActionResult, ActionStatus, NarrativeOrchestrator, Opening, SessionState};
pub use persist::{PersistError, SaveMetadata, SavedCampaign};
pub use roadmap::{Roadmap, RoadmapError, RoadmapStore, StoreSnapshot};
pub use session::{CampaignSession, SessionError};
pub use testing::{MockGenerator, TestHarness};
