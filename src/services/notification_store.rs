//! Notification persistence behind one contract, plus the per-session
//! snapshot and last-check bookkeeping.

use crate::constants::keys;
use crate::domain::{AnimeId, UserId};
use crate::models::{BookmarkSnapshot, Notification};
use crate::services::remote_store::RemoteStore;
use crate::services::watch_service::WatchError;
use crate::storage::{BlobStorage, read_json, write_json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Notification>, WatchError>;

    /// Persists the outcome of a pass: `list` is the new set and `retired`
    /// names the anime whose notifications the pass removed.
    ///
    /// Rows for anime in neither were never seen by the pass and must survive.
    async fn save(&self, list: &[Notification], retired: &[AnimeId]) -> Result<(), WatchError>;

    async fn remove(&self, anime_id: &AnimeId) -> Result<(), WatchError>;

    async fn remove_all(&self) -> Result<(), WatchError>;
}

/// Anonymous backend: the whole set is one JSON array under a fixed key.
pub struct LocalNotificationStore {
    storage: Arc<dyn BlobStorage>,
}

impl LocalNotificationStore {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    fn read(&self) -> Result<Vec<Notification>, WatchError> {
        let list: Vec<Notification> =
            read_json(self.storage.as_ref(), keys::NOTIFICATIONS)?.unwrap_or_default();
        Ok(list.into_iter().filter(Notification::is_valid).collect())
    }
}

#[async_trait::async_trait]
impl NotificationStore for LocalNotificationStore {
    async fn load(&self) -> Result<Vec<Notification>, WatchError> {
        self.read()
    }

    async fn save(&self, list: &[Notification], _retired: &[AnimeId]) -> Result<(), WatchError> {
        write_json(self.storage.as_ref(), keys::NOTIFICATIONS, list)?;
        Ok(())
    }

    async fn remove(&self, anime_id: &AnimeId) -> Result<(), WatchError> {
        let mut list = self.read()?;
        let before = list.len();
        list.retain(|n| &n.anime_id != anime_id);
        if list.len() == before {
            debug!(anime_id = %anime_id, "Dismissed notification was not stored");
            return Ok(());
        }
        write_json(self.storage.as_ref(), keys::NOTIFICATIONS, &list)?;
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), WatchError> {
        self.storage.remove(keys::NOTIFICATIONS)?;
        Ok(())
    }
}

/// Authenticated backend. Rows are keyed by `(user, anime)` remotely, so
/// concurrent writers converge to last-write-wins per anime.
pub struct RemoteNotificationStore {
    store: Arc<dyn RemoteStore>,
    user: UserId,
}

impl RemoteNotificationStore {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, user: UserId) -> Self {
        Self { store, user }
    }
}

#[async_trait::async_trait]
impl NotificationStore for RemoteNotificationStore {
    async fn load(&self) -> Result<Vec<Notification>, WatchError> {
        Ok(self.store.list_notifications(&self.user).await?)
    }

    async fn save(&self, list: &[Notification], retired: &[AnimeId]) -> Result<(), WatchError> {
        if !list.is_empty() {
            self.store.upsert_notifications(&self.user, list).await?;
        }

        for anime_id in retired {
            self.store.delete_notification(&self.user, anime_id).await?;
        }
        if !retired.is_empty() {
            debug!(user_id = %self.user, count = retired.len(), "Deleted retired remote notifications");
        }
        Ok(())
    }

    async fn remove(&self, anime_id: &AnimeId) -> Result<(), WatchError> {
        self.store.delete_notification(&self.user, anime_id).await?;
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), WatchError> {
        self.store.delete_all_notifications(&self.user).await?;
        Ok(())
    }
}

/// Appends the session suffix to a per-session key.
#[must_use]
pub fn scoped_key(base: &str, user: Option<&UserId>) -> String {
    match user {
        Some(user) => format!("{base}:{user}"),
        None => base.to_string(),
    }
}

/// Bookmark snapshot and last-check time for one session.
///
/// Both always live in local storage, under keys scoped to the session so an
/// anonymous and an authenticated session never share them.
pub struct SnapshotStore {
    storage: Arc<dyn BlobStorage>,
    snapshot_key: String,
    last_check_key: String,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>, user: Option<&UserId>) -> Self {
        Self {
            storage,
            snapshot_key: scoped_key(keys::BOOKMARK_SNAPSHOT, user),
            last_check_key: scoped_key(keys::LAST_UPDATE_CHECK, user),
        }
    }

    pub fn load_snapshot(&self) -> BookmarkSnapshot {
        match read_json(self.storage.as_ref(), &self.snapshot_key) {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                warn!(key = %self.snapshot_key, error = %e, "Failed to read bookmark snapshot");
                BookmarkSnapshot::new()
            }
        }
    }

    pub fn save_snapshot(&self, snapshot: &BookmarkSnapshot) -> Result<(), WatchError> {
        write_json(self.storage.as_ref(), &self.snapshot_key, snapshot)?;
        Ok(())
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        match read_json(self.storage.as_ref(), &self.last_check_key) {
            Ok(at) => at,
            Err(e) => {
                warn!(key = %self.last_check_key, error = %e, "Failed to read last check time");
                None
            }
        }
    }

    pub fn stamp_check(&self, at: DateTime<Utc>) -> Result<(), WatchError> {
        write_json(self.storage.as_ref(), &self.last_check_key, &at)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStorage;

    fn notification(id: &str, old: u32, new: u32) -> Notification {
        Notification {
            anime_id: AnimeId::new(id),
            anime_title: format!("Anime {id}"),
            old_episode: old,
            new_episode: new,
            total_episodes: None,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn local_store_round_trips_and_removes() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let store = LocalNotificationStore::new(storage);

        store
            .save(&[notification("1", 1, 2), notification("2", 3, 4)], &[])
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().len(), 2);

        store.remove(&AnimeId::new("1")).await.unwrap();
        let left = store.load().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].anime_id.as_str(), "2");

        store.remove_all().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_store_drops_corrupt_and_invalid_entries() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let store = LocalNotificationStore::new(storage.clone());

        storage.set(keys::NOTIFICATIONS, "[{\"broken\":").unwrap();
        assert!(store.load().await.unwrap().is_empty());

        write_json(
            storage.as_ref(),
            keys::NOTIFICATIONS,
            &vec![notification("1", 5, 5), notification("2", 1, 2)],
        )
        .unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].anime_id.as_str(), "2");
    }

    #[test]
    fn snapshot_keys_are_scoped_per_session() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let anonymous = SnapshotStore::new(storage.clone(), None);
        let user = UserId::new("u1");
        let authed = SnapshotStore::new(storage.clone(), Some(&user));

        let snapshot: BookmarkSnapshot = [(AnimeId::new("9"), 3)].into_iter().collect();
        anonymous.save_snapshot(&snapshot).unwrap();

        assert_eq!(anonymous.load_snapshot(), snapshot);
        assert!(authed.load_snapshot().is_empty());
        assert!(storage.get("bookmark_snapshot").unwrap().is_some());
        assert!(storage.get("bookmark_snapshot:u1").unwrap().is_none());
    }

    #[test]
    fn last_check_round_trips() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let ledger = SnapshotStore::new(storage, None);
        assert_eq!(ledger.last_check(), None);

        let now = Utc::now();
        ledger.stamp_check(now).unwrap();
        assert_eq!(ledger.last_check(), Some(now));
    }
}
