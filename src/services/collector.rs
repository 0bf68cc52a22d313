//! Watch-set collection: which anime the engine polls, and from what baseline.

use crate::constants::keys;
use crate::domain::{Provenance, UserId};
use crate::models::{BookmarkEntry, HistoryEntry, WatchItem};
use crate::services::remote_store::RemoteStore;
use crate::storage::{BlobStorage, read_json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Produces the watch set for one reconciliation pass. Never fails: a broken
/// source contributes nothing.
#[async_trait::async_trait]
pub trait WatchSetSource: Send + Sync {
    async fn collect(&self) -> Vec<WatchItem>;
}

/// Merges history and bookmarks into a duplicate-free watch set.
///
/// Only the first `history_limit` history entries count (callers pass them
/// most-recent-first). History wins over a bookmark for the same anime.
#[must_use]
pub fn merge_watch_set(
    history: &[HistoryEntry],
    bookmarks: &[BookmarkEntry],
    history_limit: usize,
) -> Vec<WatchItem> {
    let mut items: HashMap<_, WatchItem> = HashMap::new();
    let mut order = Vec::new();

    for entry in history.iter().take(history_limit) {
        if items.contains_key(&entry.anime_id) {
            continue;
        }
        order.push(entry.anime_id.clone());
        items.insert(
            entry.anime_id.clone(),
            WatchItem {
                anime_id: entry.anime_id.clone(),
                title: entry.anime_title.clone(),
                provenance: Provenance::History,
                baseline_episode: entry.episode,
            },
        );
    }

    for entry in bookmarks {
        if items.contains_key(&entry.anime_id) {
            continue;
        }
        order.push(entry.anime_id.clone());
        items.insert(
            entry.anime_id.clone(),
            WatchItem {
                anime_id: entry.anime_id.clone(),
                title: entry.anime_title.clone(),
                provenance: Provenance::Bookmark,
                baseline_episode: 0,
            },
        );
    }

    order
        .into_iter()
        .filter_map(|id| items.remove(&id))
        .collect()
}

/// Anonymous session: history and bookmarks from local blobs.
pub struct LocalWatchSource {
    storage: Arc<dyn BlobStorage>,
    history_limit: usize,
}

impl LocalWatchSource {
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStorage>, history_limit: usize) -> Self {
        Self {
            storage,
            history_limit,
        }
    }

    fn read_list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match read_json::<Vec<T>>(self.storage.as_ref(), key) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                warn!(key, error = %e, "Failed to read local watch data");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl WatchSetSource for LocalWatchSource {
    async fn collect(&self) -> Vec<WatchItem> {
        let mut history: Vec<HistoryEntry> = self.read_list(keys::WATCH_HISTORY);
        history.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        let bookmarks: Vec<BookmarkEntry> = self.read_list(keys::BOOKMARKS);

        merge_watch_set(&history, &bookmarks, self.history_limit)
    }
}

/// Authenticated session: the same query against the remote store.
pub struct RemoteWatchSource {
    store: Arc<dyn RemoteStore>,
    user: UserId,
    history_limit: usize,
}

impl RemoteWatchSource {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, user: UserId, history_limit: usize) -> Self {
        Self {
            store,
            user,
            history_limit,
        }
    }
}

#[async_trait::async_trait]
impl WatchSetSource for RemoteWatchSource {
    async fn collect(&self) -> Vec<WatchItem> {
        let limit = u64::try_from(self.history_limit).unwrap_or(u64::MAX);
        let history = match self.store.list_history(&self.user, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user_id = %self.user, error = %e, "Failed to load remote history");
                Vec::new()
            }
        };
        let bookmarks = match self.store.list_bookmarks(&self.user).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user_id = %self.user, error = %e, "Failed to load remote bookmarks");
                Vec::new()
            }
        };

        merge_watch_set(&history, &bookmarks, self.history_limit)
    }
}
