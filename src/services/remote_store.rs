//! Capability boundary for the authenticated backend's data store.

use crate::domain::{AnimeId, UserId};
use crate::models::{BookmarkEntry, HistoryEntry, Notification};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl From<sea_orm::DbErr> for RemoteStoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RemoteStoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Per-user rows for history, bookmarks and notifications.
///
/// Implementations must key notifications by `(user, anime)` so that
/// [`RemoteStore::upsert_notifications`] never duplicates a row.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Most recent history rows first, at most `limit`.
    async fn list_history(
        &self,
        user: &UserId,
        limit: u64,
    ) -> Result<Vec<HistoryEntry>, RemoteStoreError>;

    async fn list_bookmarks(&self, user: &UserId) -> Result<Vec<BookmarkEntry>, RemoteStoreError>;

    async fn list_notifications(
        &self,
        user: &UserId,
    ) -> Result<Vec<Notification>, RemoteStoreError>;

    async fn upsert_notifications(
        &self,
        user: &UserId,
        rows: &[Notification],
    ) -> Result<(), RemoteStoreError>;

    async fn delete_notification(
        &self,
        user: &UserId,
        anime: &AnimeId,
    ) -> Result<(), RemoteStoreError>;

    async fn delete_all_notifications(&self, user: &UserId) -> Result<(), RemoteStoreError>;

    async fn record_history(
        &self,
        user: &UserId,
        entry: &HistoryEntry,
    ) -> Result<(), RemoteStoreError>;

    async fn add_bookmark(
        &self,
        user: &UserId,
        entry: &BookmarkEntry,
    ) -> Result<(), RemoteStoreError>;

    async fn remove_bookmark(&self, user: &UserId, anime: &AnimeId)
    -> Result<bool, RemoteStoreError>;
}
