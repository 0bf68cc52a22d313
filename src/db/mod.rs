use crate::domain::{AnimeId, UserId};
use crate::models::{BookmarkEntry, HistoryEntry, Notification};
use crate::services::remote_store::{RemoteStore, RemoteStoreError};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

/// SQL-backed remote store for authenticated users.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // Every pooled connection to an in-memory SQLite database sees its own
        // empty database, so those URLs get exactly one connection.
        let in_memory = db_url.contains(":memory:");
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections.max(1), min_connections)
        };

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        // The single in-memory connection must never be recycled or the schema goes with it.
        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn history_repo(&self) -> repositories::history::HistoryRepository {
        repositories::history::HistoryRepository::new(self.conn.clone())
    }

    fn bookmark_repo(&self) -> repositories::bookmark::BookmarkRepository {
        repositories::bookmark::BookmarkRepository::new(self.conn.clone())
    }

    fn notification_repo(&self) -> repositories::notification::NotificationRepository {
        repositories::notification::NotificationRepository::new(self.conn.clone())
    }
}

#[async_trait::async_trait]
impl RemoteStore for Store {
    async fn list_history(
        &self,
        user: &UserId,
        limit: u64,
    ) -> Result<Vec<HistoryEntry>, RemoteStoreError> {
        Ok(self.history_repo().list_recent(user.as_str(), limit).await?)
    }

    async fn list_bookmarks(&self, user: &UserId) -> Result<Vec<BookmarkEntry>, RemoteStoreError> {
        Ok(self.bookmark_repo().list(user.as_str()).await?)
    }

    async fn list_notifications(
        &self,
        user: &UserId,
    ) -> Result<Vec<Notification>, RemoteStoreError> {
        Ok(self.notification_repo().list(user.as_str()).await?)
    }

    async fn upsert_notifications(
        &self,
        user: &UserId,
        rows: &[Notification],
    ) -> Result<(), RemoteStoreError> {
        Ok(self.notification_repo().upsert(user.as_str(), rows).await?)
    }

    async fn delete_notification(
        &self,
        user: &UserId,
        anime: &AnimeId,
    ) -> Result<(), RemoteStoreError> {
        self.notification_repo()
            .delete(user.as_str(), anime.as_str())
            .await?;
        Ok(())
    }

    async fn delete_all_notifications(&self, user: &UserId) -> Result<(), RemoteStoreError> {
        self.notification_repo().delete_all(user.as_str()).await?;
        Ok(())
    }

    async fn record_history(
        &self,
        user: &UserId,
        entry: &HistoryEntry,
    ) -> Result<(), RemoteStoreError> {
        Ok(self.history_repo().record(user.as_str(), entry).await?)
    }

    async fn add_bookmark(
        &self,
        user: &UserId,
        entry: &BookmarkEntry,
    ) -> Result<(), RemoteStoreError> {
        Ok(self.bookmark_repo().add(user.as_str(), entry).await?)
    }

    async fn remove_bookmark(
        &self,
        user: &UserId,
        anime: &AnimeId,
    ) -> Result<bool, RemoteStoreError> {
        Ok(self
            .bookmark_repo()
            .remove(user.as_str(), anime.as_str())
            .await?)
    }
}
