use super::{episode_from_column, episode_to_column, format_timestamp, parse_timestamp};
use crate::entities::{prelude::*, watch_history};
use crate::models::HistoryEntry;
use anyhow::{Context, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::warn;

pub struct HistoryRepository {
    conn: DatabaseConnection,
}

impl HistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Most recently watched anime first.
    pub async fn list_recent(&self, user_id: &str, limit: u64) -> Result<Vec<HistoryEntry>> {
        let rows = WatchHistory::find()
            .filter(watch_history::Column::UserId.eq(user_id))
            .order_by_desc(watch_history::Column::WatchedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list watch history")?;

        Ok(rows.into_iter().filter_map(into_entry).collect())
    }

    /// Upserts the user's progress for one anime.
    pub async fn record(&self, user_id: &str, entry: &HistoryEntry) -> Result<()> {
        let model = watch_history::ActiveModel {
            user_id: Set(user_id.to_string()),
            anime_id: Set(entry.anime_id.to_string()),
            anime_title: Set(entry.anime_title.clone()),
            episode: Set(episode_to_column(entry.episode)),
            watched_at: Set(format_timestamp(entry.watched_at)),
        };

        WatchHistory::insert(model)
            .on_conflict(
                OnConflict::columns([
                    watch_history::Column::UserId,
                    watch_history::Column::AnimeId,
                ])
                .update_columns([
                    watch_history::Column::AnimeTitle,
                    watch_history::Column::Episode,
                    watch_history::Column::WatchedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to record watch history")?;

        Ok(())
    }
}

fn into_entry(row: watch_history::Model) -> Option<HistoryEntry> {
    let Some(watched_at) = parse_timestamp(&row.watched_at) else {
        warn!(anime_id = %row.anime_id, "Skipping history row with malformed timestamp");
        return None;
    };

    Some(HistoryEntry {
        anime_id: row.anime_id.into(),
        anime_title: row.anime_title,
        episode: episode_from_column(row.episode),
        watched_at,
    })
}
