use anyhow::Context;
use std::sync::Arc;

use crate::clients::anilist::AnilistClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::session::{SessionFactory, load_session};
use crate::services::{
    CheckTrigger, EpisodeWatchService, EventBus, FreshnessProber, WatchLibrary,
};
use crate::storage::FileBlobStorage;

/// Everything a command or the daemon needs, built once from config.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub storage: Arc<FileBlobStorage>,

    pub store: Store,

    pub event_bus: EventBus,

    pub service: Arc<EpisodeWatchService>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(
            FileBlobStorage::open(&config.general.data_dir).with_context(|| {
                format!("Failed to open data directory: {}", config.general.data_dir)
            })?,
        );

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await
        .context("Failed to open remote store")?;

        let anilist = AnilistClient::with_timeout(&config.anilist.api_url, config.request_timeout())
            .context("Failed to build AniList client")?;
        let prober = FreshnessProber::with_batch_limit(Arc::new(anilist), config.anilist.batch_limit);

        let event_bus = EventBus::new(config.general.event_bus_buffer_size);
        let user = load_session(storage.as_ref()).context("Failed to read saved session")?;

        let factory = SessionFactory::new(
            storage.clone(),
            Arc::new(store.clone()),
            config.watcher.history_limit,
        );
        let service = Arc::new(
            EpisodeWatchService::new(factory, user, prober, event_bus.clone())
                .with_min_interval(config.watcher.min_check_interval()),
        );

        Ok(Self {
            config,
            storage,
            store,
            event_bus,
            service,
        })
    }

    #[must_use]
    pub fn library(&self, trigger: Option<CheckTrigger>) -> WatchLibrary {
        WatchLibrary::new(Arc::clone(&self.service), trigger)
    }
}
