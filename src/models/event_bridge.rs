use tokio::sync::broadcast;

use crate::models::events::TimelineEvent;

pub(crate) const DEFAULT_BRIDGE_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct EventBridge {
    sender: broadcast::Sender<TimelineEvent>,
}

impl EventBridge {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Events emitted while nobody listens are dropped.
    pub fn emit(&self, event: TimelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_CAPACITY)
    }
}
