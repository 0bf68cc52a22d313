#![allow(dead_code)]

use shinchaku::db::Store;
use shinchaku::domain::{AiringStatus, AnimeId, UserId};
use shinchaku::models::{BookmarkEntry, FreshRecord, HistoryEntry, Notification};
use shinchaku::services::{
    EpisodeSource, EpisodeWatchService, EventBus, FreshnessProber, ProbeError, RemoteStore,
    RemoteStoreError, SessionFactory, WatchLibrary,
};
use shinchaku::storage::{BlobStorage, MemoryBlobStorage, StorageError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Episode source whose answers are set by the test.
#[derive(Default)]
pub struct ScriptedSource {
    records: Mutex<HashMap<AnimeId, FreshRecord>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedSource {
    pub fn airing(&self, id: &str, current: u32) {
        self.set(id, current, AiringStatus::Ongoing);
    }

    pub fn set(&self, id: &str, current: u32, status: AiringStatus) {
        self.records.lock().unwrap().insert(
            AnimeId::new(id),
            FreshRecord {
                id: AnimeId::new(id),
                title: Some(format!("Anime {id}")),
                current_episode: Some(current),
                total_episodes: Some(24),
                status,
            },
        );
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next lookups wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait::async_trait]
impl EpisodeSource for ScriptedSource {
    async fn fetch_current_episode_counts(
        &self,
        ids: &[AnimeId],
    ) -> Result<Vec<FreshRecord>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProbeError::Api("scripted outage".to_string()));
        }

        let records = self.records.lock().unwrap();
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }
}

/// In-memory storage whose writes to chosen keys can be made to fail.
#[derive(Default)]
pub struct FaultyStorage {
    inner: MemoryBlobStorage,
    broken: Mutex<HashSet<String>>,
}

impl FaultyStorage {
    /// Makes every `set` and `remove` of `key` fail until [`Self::heal`].
    pub fn break_writes(&self, key: &str) {
        self.broken.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.broken.lock().unwrap().clear();
    }

    fn check(&self, key: &str) -> Result<(), StorageError> {
        if self.broken.lock().unwrap().contains(key) {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "write to {key} refused"
            ))));
        }
        Ok(())
    }
}

impl BlobStorage for FaultyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.remove(key)
    }
}

/// Remote store that can park the next notification upsert until released.
pub struct GatedRemote {
    inner: Store,
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl GatedRemote {
    pub fn new(inner: Store) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// Returns `(reached, release)`: `reached` fires when the next upsert
    /// arrives, which then waits for `release`.
    pub fn hold_next_upsert(&self) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some((Arc::clone(&reached), Arc::clone(&release)));
        (reached, release)
    }
}

#[async_trait::async_trait]
impl RemoteStore for GatedRemote {
    async fn list_history(
        &self,
        user: &UserId,
        limit: u64,
    ) -> Result<Vec<HistoryEntry>, RemoteStoreError> {
        self.inner.list_history(user, limit).await
    }

    async fn list_bookmarks(&self, user: &UserId) -> Result<Vec<BookmarkEntry>, RemoteStoreError> {
        self.inner.list_bookmarks(user).await
    }

    async fn list_notifications(
        &self,
        user: &UserId,
    ) -> Result<Vec<Notification>, RemoteStoreError> {
        self.inner.list_notifications(user).await
    }

    async fn upsert_notifications(
        &self,
        user: &UserId,
        rows: &[Notification],
    ) -> Result<(), RemoteStoreError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some((reached, release)) = gate {
            reached.notify_one();
            release.notified().await;
        }
        self.inner.upsert_notifications(user, rows).await
    }

    async fn delete_notification(
        &self,
        user: &UserId,
        anime: &AnimeId,
    ) -> Result<(), RemoteStoreError> {
        self.inner.delete_notification(user, anime).await
    }

    async fn delete_all_notifications(&self, user: &UserId) -> Result<(), RemoteStoreError> {
        self.inner.delete_all_notifications(user).await
    }

    async fn record_history(
        &self,
        user: &UserId,
        entry: &HistoryEntry,
    ) -> Result<(), RemoteStoreError> {
        self.inner.record_history(user, entry).await
    }

    async fn add_bookmark(
        &self,
        user: &UserId,
        entry: &BookmarkEntry,
    ) -> Result<(), RemoteStoreError> {
        self.inner.add_bookmark(user, entry).await
    }

    async fn remove_bookmark(
        &self,
        user: &UserId,
        anime: &AnimeId,
    ) -> Result<bool, RemoteStoreError> {
        self.inner.remove_bookmark(user, anime).await
    }
}

pub struct Harness {
    pub storage: Arc<FaultyStorage>,
    pub store: Store,
    pub remote: Arc<GatedRemote>,
    pub source: Arc<ScriptedSource>,
    pub bus: EventBus,
    pub service: Arc<EpisodeWatchService>,
}

impl Harness {
    pub async fn new(user: Option<&str>) -> Self {
        let storage = Arc::new(FaultyStorage::default());
        let store = Store::new("sqlite::memory:")
            .await
            .expect("failed to open in-memory store");
        let source = Arc::new(ScriptedSource::default());
        let bus = EventBus::new(64);

        let remote = Arc::new(GatedRemote::new(store.clone()));
        let factory = SessionFactory::new(storage.clone(), remote.clone(), 30);
        let service = Arc::new(EpisodeWatchService::new(
            factory,
            user.map(UserId::new),
            FreshnessProber::new(source.clone()),
            bus.clone(),
        ));
        service.init().await.expect("failed to init service");

        Self {
            storage,
            store,
            remote,
            source,
            bus,
            service,
        }
    }

    pub fn library(&self) -> WatchLibrary {
        WatchLibrary::new(Arc::clone(&self.service), None)
    }

    pub async fn watched(&self, id: &str, episode: u32) {
        self.library()
            .record_watch(AnimeId::new(id), Some(format!("Anime {id}")), episode)
            .await
            .expect("failed to record watch");
    }

    pub async fn bookmarked(&self, id: &str) {
        self.library()
            .add_bookmark(AnimeId::new(id), None)
            .await
            .expect("failed to add bookmark");
    }

    /// `(anime_id, old, new)` for every live notification, sorted by anime.
    pub async fn live(&self) -> Vec<(String, u32, u32)> {
        let mut live: Vec<_> = self
            .service
            .notifications()
            .await
            .into_iter()
            .map(|n| (n.anime_id.into_inner(), n.old_episode, n.new_episode))
            .collect();
        live.sort();
        live
    }
}

pub fn triple(id: &str, old: u32, new: u32) -> (String, u32, u32) {
    (id.to_string(), old, new)
}
