use crate::domain::AnimeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A "new episode" notification. At most one is live per anime.
///
/// Invariant: `new_episode > old_episode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub anime_id: AnimeId,
    pub anime_title: String,
    pub old_episode: u32,
    pub new_episode: u32,
    #[serde(default)]
    pub total_episodes: Option<u32>,
    pub observed_at: DateTime<Utc>,
}

impl Notification {
    /// Number of episodes the user is behind.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.new_episode.saturating_sub(self.old_episode)
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.new_episode > self.old_episode
    }
}

/// Last observed episode count for bookmark-only anime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkSnapshot(BTreeMap<AnimeId, u32>);

impl BookmarkSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &AnimeId) -> Option<u32> {
        self.0.get(id).copied()
    }

    /// Records `episode` for `id`, returning whether the stored value changed.
    pub fn record(&mut self, id: &AnimeId, episode: u32) -> bool {
        match self.0.insert(id.clone(), episode) {
            Some(prev) => prev != episode,
            None => true,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(AnimeId, u32)> for BookmarkSnapshot {
    fn from_iter<T: IntoIterator<Item = (AnimeId, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_blob_uses_camel_case() {
        let n = Notification {
            anime_id: AnimeId::new("1"),
            anime_title: "Frieren".to_string(),
            old_episode: 14,
            new_episode: 15,
            total_episodes: Some(28),
            observed_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["animeId"], "1");
        assert_eq!(json["oldEpisode"], 14);
        assert_eq!(json["newEpisode"], 15);
        assert_eq!(json["totalEpisodes"], 28);
        assert_eq!(json["observedAt"], "2026-01-01T00:00:00Z");
        assert_eq!(n.pending(), 1);
    }

    #[test]
    fn snapshot_record_reports_changes() {
        let mut snapshot = BookmarkSnapshot::new();
        let id = AnimeId::new("9");
        assert!(snapshot.record(&id, 8));
        assert!(!snapshot.record(&id, 8));
        assert!(snapshot.record(&id, 9));
        assert_eq!(snapshot.get(&id), Some(9));
    }
}
