use crate::domain::events::EngineEvent;
use crate::models::Notification;
use crate::services::event_bus::EventObserver;
use crate::services::watch_service::EpisodeWatchService;
use std::sync::Arc;
use tokio::sync::watch;

/// Observer that mirrors the service's notification list into a watch
/// channel. Readers pull the latest list whenever it changes.
pub struct NotificationFeed {
    service: Arc<EpisodeWatchService>,
    sender: watch::Sender<Vec<Notification>>,
}

impl NotificationFeed {
    #[must_use]
    pub fn new(service: Arc<EpisodeWatchService>) -> (Arc<Self>, watch::Receiver<Vec<Notification>>) {
        let (sender, receiver) = watch::channel(Vec::new());
        (Arc::new(Self { service, sender }), receiver)
    }

    async fn refresh(&self) {
        let latest = self.service.notifications().await;
        self.sender.send_if_modified(|current| {
            if *current == latest {
                false
            } else {
                *current = latest;
                true
            }
        });
    }
}

#[async_trait::async_trait]
impl EventObserver for NotificationFeed {
    async fn on_event(&self, event: EngineEvent) {
        if matches!(
            event,
            EngineEvent::NotificationsChanged { .. } | EngineEvent::SessionChanged { .. }
        ) {
            self.refresh().await;
        }
    }

    async fn on_lagged(&self, _missed: u64) {
        self.refresh().await;
    }
}
