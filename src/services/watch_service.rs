//! The episode watch service: one owned object per process holding the
//! active session, the cached notification list and the in-flight guard.

use crate::domain::events::{EngineEvent, SessionScope, SkipReason};
use crate::domain::{AnimeId, UserId};
use crate::models::Notification;
use crate::services::event_bus::EventBus;
use crate::services::prober::FreshnessProber;
use crate::services::reconciler::reconcile;
use crate::services::remote_store::RemoteStoreError;
use crate::services::session::{SessionBackend, SessionFactory};
use crate::storage::StorageError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteStoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for WatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Skipped(SkipReason),
    Completed {
        changed: bool,
        notifications: Vec<Notification>,
    },
    /// The pass could not read or write the notification set. Nothing changed.
    Failed,
}

impl CheckOutcome {
    const fn label(&self) -> &'static str {
        match self {
            Self::Skipped(SkipReason::InFlight) => "in_flight",
            Self::Skipped(SkipReason::Throttled) => "throttled",
            Self::Skipped(SkipReason::Disposed) => "disposed",
            Self::Completed { changed: true, .. } => "changed",
            Self::Completed { changed: false, .. } => "unchanged",
            Self::Failed => "failed",
        }
    }
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct EpisodeWatchService {
    factory: SessionFactory,
    backend: RwLock<SessionBackend>,
    notifications: RwLock<Vec<Notification>>,
    prober: FreshnessProber,
    bus: EventBus,
    min_interval: Duration,
    in_flight: AtomicBool,
    disposed: AtomicBool,
}

impl EpisodeWatchService {
    #[must_use]
    pub fn new(
        factory: SessionFactory,
        user: Option<UserId>,
        prober: FreshnessProber,
        bus: EventBus,
    ) -> Self {
        let backend = factory.for_user(user);
        Self {
            factory,
            backend: RwLock::new(backend),
            notifications: RwLock::new(Vec::new()),
            prober,
            bus,
            min_interval: crate::constants::intervals::MIN_CHECK_INTERVAL,
            in_flight: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Raises the automatic-check throttle. It never goes below 15 minutes.
    #[must_use]
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval.max(crate::constants::intervals::MIN_CHECK_INTERVAL);
        self
    }

    /// Loads the active backend's notifications and announces them.
    pub async fn init(&self) -> Result<(), WatchError> {
        self.disposed.store(false, Ordering::Release);
        self.reload().await?;
        info!(scope = %self.scope().await, "Episode watch service initialized");
        Ok(())
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        info!("Episode watch service disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    pub async fn backend(&self) -> SessionBackend {
        self.backend.read().await.clone()
    }

    pub async fn scope(&self) -> SessionScope {
        self.backend.read().await.scope()
    }

    pub async fn current_user(&self) -> Option<UserId> {
        self.backend.read().await.user().cloned()
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Runs one reconciliation pass unless one is running, the service is
    /// disposed, or (without `force`) the last pass was too recent.
    pub async fn check_now(&self, force: bool) -> CheckOutcome {
        let outcome = self.run_check(force).await;
        metrics::counter!("shinchaku_checks_total", "outcome" => outcome.label()).increment(1);
        if let CheckOutcome::Skipped(reason) = outcome {
            debug!(?reason, forced = force, "Episode check skipped");
            self.bus.publish(EngineEvent::CheckSkipped { reason });
        }
        outcome
    }

    async fn run_check(&self, force: bool) -> CheckOutcome {
        if self.is_disposed() {
            return CheckOutcome::Skipped(SkipReason::Disposed);
        }

        if self.in_flight.swap(true, Ordering::AcqRel) {
            return CheckOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = InFlight(&self.in_flight);

        // Writes go to the backend active when the pass started.
        let backend = self.backend().await;
        let now = Utc::now();

        if !force
            && let Some(last) = backend.ledger.last_check()
            && (now - last)
                .to_std()
                .is_ok_and(|elapsed| elapsed < self.min_interval)
        {
            return CheckOutcome::Skipped(SkipReason::Throttled);
        }

        let start = Instant::now();
        info!(event = "check_started", forced = force, scope = %backend.scope(), "Checking for new episodes");
        self.bus.publish(EngineEvent::CheckStarted { forced: force });

        if let Err(e) = backend.ledger.stamp_check(now) {
            warn!(error = %e, "Failed to persist last check time");
        }

        let watch_set = backend.watch_source.collect().await;
        let ids: Vec<AnimeId> = watch_set.iter().map(|item| item.anime_id.clone()).collect();
        let fresh = self.prober.probe(&ids).await;

        let prior = match backend.notifications.load().await {
            Ok(list) => list,
            Err(e) => {
                error!(event = "check_failed", error = %e, "Failed to load notifications");
                return CheckOutcome::Failed;
            }
        };
        let prior_snapshot = backend.ledger.load_snapshot();

        let outcome = reconcile(&watch_set, &fresh, &prior, &prior_snapshot, now);

        // The snapshot may only advance once the notifications it produced are stored.
        if outcome.changed {
            if let Err(e) = backend
                .notifications
                .save(&outcome.notifications, &outcome.retired)
                .await
            {
                error!(event = "check_failed", error = %e, "Failed to persist notifications");
                return CheckOutcome::Failed;
            }
            metrics::counter!("shinchaku_notifications_created_total")
                .increment(outcome.created.len() as u64);
            metrics::counter!("shinchaku_notifications_retired_total")
                .increment(outcome.retired.len() as u64);
        }

        if outcome.snapshot_changed
            && let Err(e) = backend.ledger.save_snapshot(&outcome.snapshot)
        {
            warn!(error = %e, "Failed to persist bookmark snapshot");
        }

        let active = outcome.notifications.len();
        if self.scope().await == backend.scope() {
            self.replace_cache(outcome.notifications.clone()).await;
            if outcome.changed {
                self.bus.publish(EngineEvent::NotificationsChanged {
                    scope: backend.scope(),
                });
            }
        } else {
            debug!("Session changed during check; cache left to the new session");
        }

        info!(
            event = "check_finished",
            watched = watch_set.len(),
            probed = fresh.len(),
            created = outcome.created.len(),
            upgraded = outcome.upgraded.len(),
            retired = outcome.retired.len(),
            active,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Episode check finished"
        );
        self.bus.publish(EngineEvent::CheckFinished {
            changed: outcome.changed,
            active,
        });

        CheckOutcome::Completed {
            changed: outcome.changed,
            notifications: outcome.notifications,
        }
    }

    /// Removes one notification. On failure the cached list is left as is.
    pub async fn dismiss(&self, anime_id: &AnimeId) -> Result<(), WatchError> {
        let backend = self.backend().await;
        if let Err(e) = backend.notifications.remove(anime_id).await {
            error!(anime_id = %anime_id, error = %e, "Failed to dismiss notification");
            return Err(e);
        }
        info!(anime_id = %anime_id, "Notification dismissed");
        self.reload().await
    }

    pub async fn dismiss_all(&self) -> Result<(), WatchError> {
        let backend = self.backend().await;
        if let Err(e) = backend.notifications.remove_all().await {
            error!(error = %e, "Failed to dismiss all notifications");
            return Err(e);
        }
        info!("All notifications dismissed");
        self.reload().await
    }

    /// Re-reads the canonical list from the active backend.
    pub async fn reload(&self) -> Result<(), WatchError> {
        let backend = self.backend().await;
        let list = match backend.notifications.load().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to reload notifications");
                return Err(e);
            }
        };

        if self.scope().await != backend.scope() {
            return Ok(());
        }
        self.replace_cache(list).await;
        self.bus.publish(EngineEvent::NotificationsChanged {
            scope: backend.scope(),
        });
        Ok(())
    }

    /// Swaps the active backend. The two sessions' notifications are never merged.
    pub async fn switch_session(&self, user: Option<UserId>) -> Result<(), WatchError> {
        let next = self.factory.for_user(user);
        let scope = next.scope();
        {
            let mut backend = self.backend.write().await;
            if backend.scope() == scope {
                return Ok(());
            }
            *backend = next;
        }

        self.replace_cache(Vec::new()).await;
        info!(scope = %scope, "Session switched");
        self.bus.publish(EngineEvent::SessionChanged { scope });
        self.reload().await
    }

    async fn replace_cache(&self, list: Vec<Notification>) {
        let count = list.len();
        *self.notifications.write().await = list;
        metrics::gauge!("shinchaku_active_notifications")
            .set(f64::from(u32::try_from(count).unwrap_or(u32::MAX)));
    }
}
