use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{ClientConfig, ProgressPoint};

/// SSE event payload variants (§4.9): `data` shape differs by event type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    Start {
        network: String,
        el_client: ClientConfig,
        cl_client: ClientConfig,
        labels: std::collections::BTreeMap<String, String>,
    },
    Progress(ProgressPoint),
    Complete {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub run_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub data: EventData,
}

const CHANNEL_CAPACITY: usize = 1000;

/// Broadcast hub for `test_start` / `test_progress` / `test_complete` events
/// (§4.9). A single `tokio::sync::broadcast::channel`; slow subscribers are
/// dropped rather than backpressuring publishers.
pub struct SSEHub {
    sender: broadcast::Sender<Event>,
}

impl Default for SSEHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SSEHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        SSEHub { sender }
    }

    /// Publish outside any store lock — callers build the event, drop the
    /// lock, then call this.
    pub fn publish(&self, event: Event) {
        // A send error just means there are currently no subscribers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
