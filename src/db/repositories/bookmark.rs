use super::{format_timestamp, parse_timestamp};
use crate::entities::{bookmarks, prelude::*};
use crate::models::BookmarkEntry;
use anyhow::{Context, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::warn;

pub struct BookmarkRepository {
    conn: DatabaseConnection,
}

impl BookmarkRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<BookmarkEntry>> {
        let rows = Bookmarks::find()
            .filter(bookmarks::Column::UserId.eq(user_id))
            .order_by_desc(bookmarks::Column::AddedAt)
            .all(&self.conn)
            .await
            .context("Failed to list bookmarks")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let Some(added_at) = parse_timestamp(&row.added_at) else {
                    warn!(anime_id = %row.anime_id, "Skipping bookmark row with malformed timestamp");
                    return None;
                };
                Some(BookmarkEntry {
                    anime_id: row.anime_id.into(),
                    anime_title: row.anime_title,
                    added_at,
                })
            })
            .collect())
    }

    /// Adds a bookmark. Re-adding keeps the original `added_at`.
    pub async fn add(&self, user_id: &str, entry: &BookmarkEntry) -> Result<()> {
        let model = bookmarks::ActiveModel {
            user_id: Set(user_id.to_string()),
            anime_id: Set(entry.anime_id.to_string()),
            anime_title: Set(entry.anime_title.clone()),
            added_at: Set(format_timestamp(entry.added_at)),
        };

        Bookmarks::insert(model)
            .on_conflict(
                OnConflict::columns([bookmarks::Column::UserId, bookmarks::Column::AnimeId])
                    .update_column(bookmarks::Column::AnimeTitle)
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to add bookmark")?;

        Ok(())
    }

    pub async fn remove(&self, user_id: &str, anime_id: &str) -> Result<bool> {
        let result = Bookmarks::delete_many()
            .filter(bookmarks::Column::UserId.eq(user_id))
            .filter(bookmarks::Column::AnimeId.eq(anime_id))
            .exec(&self.conn)
            .await
            .context("Failed to remove bookmark")?;

        Ok(result.rows_affected > 0)
    }
}
