//! Viewing history and bookmark writes, plus the "check needed" signal.

use crate::constants::{keys, limits};
use crate::domain::{AnimeId, UserId};
use crate::models::{BookmarkEntry, HistoryEntry};
use crate::services::remote_store::RemoteStore;
use crate::services::watch_service::{EpisodeWatchService, WatchError};
use crate::storage::{BlobStorage, read_json, write_json};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSignal {
    /// Something changed the watch set; run a forced check.
    CheckNeeded,
    /// Login finished and data was migrated; reload from the active backend.
    LoginMigrated,
}

/// Cheap handle other parts of the app use to poke the scheduler.
#[derive(Clone)]
pub struct CheckTrigger {
    sender: mpsc::UnboundedSender<TriggerSignal>,
}

impl CheckTrigger {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TriggerSignal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn request_check(&self) {
        self.send(TriggerSignal::CheckNeeded);
    }

    pub fn login_migrated(&self) {
        self.send(TriggerSignal::LoginMigrated);
    }

    fn send(&self, signal: TriggerSignal) {
        if self.sender.send(signal).is_err() {
            debug!(?signal, "Trigger dropped; scheduler is not running");
        }
    }
}

#[async_trait::async_trait]
pub trait LibraryStore: Send + Sync {
    async fn record_watch(&self, entry: HistoryEntry) -> Result<(), WatchError>;

    async fn add_bookmark(&self, entry: BookmarkEntry) -> Result<(), WatchError>;

    /// Returns whether a bookmark was removed.
    async fn remove_bookmark(&self, anime_id: &AnimeId) -> Result<bool, WatchError>;

    /// Most recent first.
    async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, WatchError>;

    async fn bookmarks(&self) -> Result<Vec<BookmarkEntry>, WatchError>;
}

pub struct LocalLibraryStore {
    storage: Arc<dyn BlobStorage>,
}

impl LocalLibraryStore {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    fn read_history(&self) -> Result<Vec<HistoryEntry>, WatchError> {
        let mut history: Vec<HistoryEntry> =
            read_json(self.storage.as_ref(), keys::WATCH_HISTORY)?.unwrap_or_default();
        history.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        Ok(history)
    }

    fn read_bookmarks(&self) -> Result<Vec<BookmarkEntry>, WatchError> {
        Ok(read_json(self.storage.as_ref(), keys::BOOKMARKS)?.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LibraryStore for LocalLibraryStore {
    async fn record_watch(&self, entry: HistoryEntry) -> Result<(), WatchError> {
        let mut history = self.read_history()?;
        history.retain(|h| h.anime_id != entry.anime_id);
        history.insert(0, entry);
        history.truncate(limits::LOCAL_HISTORY_CAP);
        write_json(self.storage.as_ref(), keys::WATCH_HISTORY, &history)?;
        Ok(())
    }

    async fn add_bookmark(&self, entry: BookmarkEntry) -> Result<(), WatchError> {
        let mut bookmarks = self.read_bookmarks()?;
        match bookmarks.iter_mut().find(|b| b.anime_id == entry.anime_id) {
            Some(existing) => {
                if entry.anime_title.is_some() {
                    existing.anime_title = entry.anime_title;
                }
            }
            None => bookmarks.push(entry),
        }
        write_json(self.storage.as_ref(), keys::BOOKMARKS, &bookmarks)?;
        Ok(())
    }

    async fn remove_bookmark(&self, anime_id: &AnimeId) -> Result<bool, WatchError> {
        let mut bookmarks = self.read_bookmarks()?;
        let before = bookmarks.len();
        bookmarks.retain(|b| &b.anime_id != anime_id);
        if bookmarks.len() == before {
            return Ok(false);
        }
        write_json(self.storage.as_ref(), keys::BOOKMARKS, &bookmarks)?;
        Ok(true)
    }

    async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, WatchError> {
        let mut history = self.read_history()?;
        history.truncate(limit);
        Ok(history)
    }

    async fn bookmarks(&self) -> Result<Vec<BookmarkEntry>, WatchError> {
        self.read_bookmarks()
    }
}

pub struct RemoteLibraryStore {
    store: Arc<dyn RemoteStore>,
    user: UserId,
}

impl RemoteLibraryStore {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, user: UserId) -> Self {
        Self { store, user }
    }
}

#[async_trait::async_trait]
impl LibraryStore for RemoteLibraryStore {
    async fn record_watch(&self, entry: HistoryEntry) -> Result<(), WatchError> {
        Ok(self.store.record_history(&self.user, &entry).await?)
    }

    async fn add_bookmark(&self, entry: BookmarkEntry) -> Result<(), WatchError> {
        Ok(self.store.add_bookmark(&self.user, &entry).await?)
    }

    async fn remove_bookmark(&self, anime_id: &AnimeId) -> Result<bool, WatchError> {
        Ok(self.store.remove_bookmark(&self.user, anime_id).await?)
    }

    async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, WatchError> {
        let limit = u64::try_from(limit).unwrap_or(u64::MAX);
        Ok(self.store.list_history(&self.user, limit).await?)
    }

    async fn bookmarks(&self) -> Result<Vec<BookmarkEntry>, WatchError> {
        Ok(self.store.list_bookmarks(&self.user).await?)
    }
}

/// Library operations against whichever session is active.
#[derive(Clone)]
pub struct WatchLibrary {
    service: Arc<EpisodeWatchService>,
    trigger: Option<CheckTrigger>,
}

impl WatchLibrary {
    #[must_use]
    pub const fn new(service: Arc<EpisodeWatchService>, trigger: Option<CheckTrigger>) -> Self {
        Self { service, trigger }
    }

    /// Records that `episode` was watched and asks for a forced check.
    pub async fn record_watch(
        &self,
        anime_id: AnimeId,
        title: Option<String>,
        episode: u32,
    ) -> Result<(), WatchError> {
        let backend = self.service.backend().await;
        backend
            .library
            .record_watch(HistoryEntry {
                anime_id: anime_id.clone(),
                anime_title: title,
                episode,
                watched_at: Utc::now(),
            })
            .await?;

        info!(anime_id = %anime_id, episode, "Recorded watch progress");
        if let Some(trigger) = &self.trigger {
            trigger.request_check();
        }
        Ok(())
    }

    pub async fn add_bookmark(
        &self,
        anime_id: AnimeId,
        title: Option<String>,
    ) -> Result<(), WatchError> {
        let backend = self.service.backend().await;
        backend
            .library
            .add_bookmark(BookmarkEntry {
                anime_id: anime_id.clone(),
                anime_title: title,
                added_at: Utc::now(),
            })
            .await?;
        info!(anime_id = %anime_id, "Bookmark added");
        Ok(())
    }

    pub async fn remove_bookmark(&self, anime_id: &AnimeId) -> Result<bool, WatchError> {
        let removed = self.service.backend().await.library.remove_bookmark(anime_id).await?;
        if removed {
            info!(anime_id = %anime_id, "Bookmark removed");
        }
        Ok(removed)
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, WatchError> {
        self.service.backend().await.library.history(limit).await
    }

    pub async fn bookmarks(&self) -> Result<Vec<BookmarkEntry>, WatchError> {
        self.service.backend().await.library.bookmarks().await
    }
}
