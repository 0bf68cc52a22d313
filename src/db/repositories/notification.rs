use super::{episode_from_column, episode_to_column, format_timestamp, parse_timestamp};
use crate::entities::{episode_notifications, prelude::*};
use crate::models::Notification;
use anyhow::{Context, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::warn;

pub struct NotificationRepository {
    conn: DatabaseConnection,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = EpisodeNotifications::find()
            .filter(episode_notifications::Column::UserId.eq(user_id))
            .order_by_desc(episode_notifications::Column::ObservedAt)
            .all(&self.conn)
            .await
            .context("Failed to list episode notifications")?;

        Ok(rows.into_iter().filter_map(into_notification).collect())
    }

    /// Insert-or-update keyed by `(user_id, anime_id)`.
    ///
    /// Concurrent writers converge to last-write-wins per anime.
    pub async fn upsert(&self, user_id: &str, rows: &[Notification]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let models = rows.iter().map(|n| episode_notifications::ActiveModel {
            user_id: Set(user_id.to_string()),
            anime_id: Set(n.anime_id.to_string()),
            anime_title: Set(n.anime_title.clone()),
            old_episode: Set(episode_to_column(n.old_episode)),
            new_episode: Set(episode_to_column(n.new_episode)),
            total_episodes: Set(n.total_episodes.map(episode_to_column)),
            observed_at: Set(format_timestamp(n.observed_at)),
        });

        EpisodeNotifications::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    episode_notifications::Column::UserId,
                    episode_notifications::Column::AnimeId,
                ])
                .update_columns([
                    episode_notifications::Column::AnimeTitle,
                    episode_notifications::Column::OldEpisode,
                    episode_notifications::Column::NewEpisode,
                    episode_notifications::Column::TotalEpisodes,
                    episode_notifications::Column::ObservedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert episode notifications")?;

        Ok(())
    }

    pub async fn delete(&self, user_id: &str, anime_id: &str) -> Result<u64> {
        let result = EpisodeNotifications::delete_many()
            .filter(episode_notifications::Column::UserId.eq(user_id))
            .filter(episode_notifications::Column::AnimeId.eq(anime_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete episode notification")?;

        Ok(result.rows_affected)
    }

    pub async fn delete_all(&self, user_id: &str) -> Result<u64> {
        let result = EpisodeNotifications::delete_many()
            .filter(episode_notifications::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete episode notifications")?;

        Ok(result.rows_affected)
    }
}

fn into_notification(row: episode_notifications::Model) -> Option<Notification> {
    let Some(observed_at) = parse_timestamp(&row.observed_at) else {
        warn!(anime_id = %row.anime_id, "Skipping notification row with malformed timestamp");
        return None;
    };

    let notification = Notification {
        anime_id: row.anime_id.into(),
        anime_title: row.anime_title,
        old_episode: episode_from_column(row.old_episode),
        new_episode: episode_from_column(row.new_episode),
        total_episodes: row.total_episodes.map(episode_from_column),
        observed_at,
    };

    if !notification.is_valid() {
        warn!(anime_id = %notification.anime_id, "Skipping notification row without a delta");
        return None;
    }

    Some(notification)
}
