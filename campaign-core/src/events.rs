//! Campaign event notifications.
//!
//! Events are fire-and-forget: they go out on a broadcast channel and a send
//! with no subscribers is silently dropped.

use crate::roadmap::{Cursor, Theme};
use tokio::sync::broadcast;

/// Capacity of the event channel. Slow subscribers see `Lagged` past this.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignEvent {
    CampaignStarted { title: String, theme: Theme },
    SceneComplete { completed: Cursor, next: Cursor },
    ChapterAdvance { chapter: usize, title: String },
    EmergencyMode { scenario: String },
    CampaignComplete,
}

/// Broadcasts campaign events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CampaignEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: CampaignEvent) {
        tracing::debug!(?event, "Campaign event");
        // No receivers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(CampaignEvent::CampaignComplete);
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(CampaignEvent::EmergencyMode {
            scenario: "Lost in the Fog".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            CampaignEvent::EmergencyMode {
                scenario: "Lost in the Fog".to_string()
            }
        );
    }
}
