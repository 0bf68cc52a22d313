use crate::domain::{AiringStatus, AnimeId, Provenance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One anime the engine must watch during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchItem {
    pub anime_id: AnimeId,
    pub title: Option<String>,
    pub provenance: Provenance,
    pub baseline_episode: u32,
}

/// A viewing-history record. One entry per anime, holding the latest episode watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub anime_id: AnimeId,
    #[serde(default)]
    pub anime_title: Option<String>,
    pub episode: u32,
    pub watched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkEntry {
    pub anime_id: AnimeId,
    #[serde(default)]
    pub anime_title: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Current published state of an anime according to the episode source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshRecord {
    pub id: AnimeId,
    pub title: Option<String>,
    /// Latest aired episode. `None` when the source could not tell.
    pub current_episode: Option<u32>,
    pub total_episodes: Option<u32>,
    pub status: AiringStatus,
}
