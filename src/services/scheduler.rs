use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock, broadcast, mpsc, watch};
use tokio::time::{Instant, interval_at, sleep};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::constants::keys;
use crate::domain::UserId;
use crate::domain::events::EngineEvent;
use crate::services::library::{CheckTrigger, TriggerSignal};
use crate::services::watch_service::{CheckOutcome, EpisodeWatchService};

type AuthSignal = watch::Receiver<Option<UserId>>;

/// Decides when reconciliation runs.
///
/// Startup, interval and cron passes respect the last-check throttle.
/// Trigger requests are forced.
pub struct Scheduler {
    service: Arc<EpisodeWatchService>,
    config: WatcherConfig,
    running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    inputs: Mutex<Option<(mpsc::UnboundedReceiver<TriggerSignal>, Option<AuthSignal>)>>,
}

impl Scheduler {
    /// Returns the scheduler and the trigger handle that feeds it.
    pub fn new(
        service: Arc<EpisodeWatchService>,
        config: WatcherConfig,
        auth: Option<AuthSignal>,
    ) -> (Self, CheckTrigger) {
        let (trigger, triggers) = CheckTrigger::channel();
        let scheduler = Self {
            service,
            config,
            running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            inputs: Mutex::new(Some((triggers, auth))),
        };
        (scheduler, trigger)
    }

    /// Runs until [`Self::stop`] is called. Can only be started once.
    pub async fn start(&self) -> Result<()> {
        let Some((mut triggers, mut auth)) = self.inputs.lock().await.take() else {
            anyhow::bail!("Scheduler already started");
        };

        *self.running.write().await = true;
        info!("Starting episode scheduler");

        let mut cron = match &self.config.cron_expression {
            Some(expr) => Some(self.start_cron(expr).await?),
            None => None,
        };

        let period = self.config.check_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        let startup = sleep(self.config.startup_delay());
        tokio::pin!(startup);
        let mut started = false;
        let mut triggers_open = true;

        let mut events = self.service.bus().subscribe();
        let mut events_open = true;

        info!(
            "Scheduler running: startup pass in {}ms, check every {}m",
            self.config.startup_delay_ms,
            period.as_secs() / 60
        );

        loop {
            if !*self.running.read().await {
                break;
            }

            tokio::select! {
                () = self.shutdown.notified() => break,
                () = &mut startup, if !started => {
                    started = true;
                    self.run_check("startup_check", false).await;
                }
                _ = ticker.tick() => {
                    self.run_check("interval_check", false).await;
                }
                signal = triggers.recv(), if triggers_open => match signal {
                    Some(TriggerSignal::CheckNeeded) => {
                        self.run_check("requested_check", true).await;
                    }
                    Some(TriggerSignal::LoginMigrated) => {
                        info!("Login migration finished; reloading notifications");
                        if let Err(e) = self.service.reload().await {
                            warn!(error = %e, "Reload after login migration failed");
                        }
                    }
                    None => triggers_open = false,
                },
                changed = async {
                    match auth.as_mut() {
                        Some(rx) => rx.changed().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if changed.is_err() {
                        debug!("Auth signal closed");
                        auth = None;
                        continue;
                    }
                    let user = auth.as_mut().and_then(|rx| rx.borrow_and_update().clone());
                    if let Err(e) = self.service.switch_session(user).await {
                        warn!(error = %e, "Failed to load notifications for new session");
                    }
                    self.run_check("session_check", false).await;
                }
                event = events.recv(), if events_open => match event {
                    Ok(EngineEvent::StorageChanged { key }) if key == keys::NOTIFICATIONS => {
                        debug!(key = %key, "Notifications changed in another process; reloading");
                        if let Err(e) = self.service.reload().await {
                            warn!(error = %e, "Reload after storage change failed");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(count, "Scheduler lagged behind engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => events_open = false,
                },
            }
        }

        if let Some(sched) = cron.as_mut() {
            sched.shutdown().await?;
        }
        info!("Episode scheduler stopped");
        Ok(())
    }

    async fn start_cron(&self, cron_expr: &str) -> Result<JobScheduler> {
        let sched = JobScheduler::new().await?;

        let service = Arc::clone(&self.service);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let service = Arc::clone(&service);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_job(&service, "cron_check", false).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;
        info!("Episode checks also scheduled with cron: {}", cron_expr);
        Ok(sched)
    }

    async fn run_check(&self, job_name: &'static str, force: bool) {
        run_job(&self.service, job_name, force).await;
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
        self.shutdown.notify_one();
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

async fn run_job(service: &EpisodeWatchService, job_name: &'static str, force: bool) {
    let start = std::time::Instant::now();
    debug!(event = "job_started", job_name, "Starting episode check");

    match service.check_now(force).await {
        CheckOutcome::Completed { changed, notifications } => info!(
            event = "job_finished",
            job_name,
            changed,
            active = notifications.len(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Episode check finished"
        ),
        CheckOutcome::Skipped(reason) => {
            debug!(event = "job_skipped", job_name, ?reason, "Episode check skipped");
        }
        CheckOutcome::Failed => {
            error!(event = "job_failed", job_name, "Episode check failed");
        }
    }
}
