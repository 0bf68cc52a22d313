//! Process-wide publish point for engine events.

use crate::domain::events::EngineEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives events from the bus. Any number of observers can be attached.
#[async_trait::async_trait]
pub trait EventObserver: Send + Sync + 'static {
    async fn on_event(&self, event: EngineEvent);

    /// Called when the observer fell behind and `missed` events were dropped.
    async fn on_lagged(&self, missed: u64) {
        let _ = missed;
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget. Having no subscribers is not an error.
    pub fn publish(&self, event: EngineEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event published with no subscribers");
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Spawns a listener task that forwards every event to `observer`.
    pub fn attach(&self, observer: Arc<dyn EventObserver>) -> JoinHandle<()> {
        let mut rx = self.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => observer.on_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(count, "Event observer lagged");
                        observer.on_lagged(count).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, observer exiting");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
