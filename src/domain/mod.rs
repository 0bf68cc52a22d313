//! Domain types for episode tracking with strong typing.
//!
//! Identifiers are newtypes so an anime ID can never be passed where a user ID
//! is expected. Both serialize as plain strings.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an anime in the external catalog.
///
/// # Examples
///
/// ```rust
/// use shinchaku::domain::AnimeId;
///
/// let id = AnimeId::new("154587");
/// assert_eq!(id.as_str(), "154587");
/// assert_eq!(id.to_string(), "154587");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimeId(String);

impl AnimeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AnimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnimeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AnimeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of an authenticated user in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Why an anime is part of the watch set.
///
/// History wins over Bookmark when an anime appears in both sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    History,
    Bookmark,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::History => f.write_str("history"),
            Self::Bookmark => f.write_str("bookmark"),
        }
    }
}

/// Airing lifecycle of a title as reported by the episode source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiringStatus {
    Ongoing,
    Completed,
    Upcoming,
    Cancelled,
    Hiatus,
    #[default]
    Unknown,
}

impl AiringStatus {
    /// Parses provider status strings leniently.
    ///
    /// Accepts AniList enum values (`RELEASING`, `FINISHED`, ...) as well as the
    /// lowercase words other catalogs use (`ongoing`, `completed`, ...).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "releasing" | "ongoing" | "airing" | "currently_airing" | "current" => Self::Ongoing,
            "finished" | "completed" | "complete" | "released" | "finished_airing" => {
                Self::Completed
            }
            "not_yet_released" | "upcoming" | "announced" | "not_yet_aired" | "tba" => {
                Self::Upcoming
            }
            "cancelled" | "canceled" => Self::Cancelled,
            "hiatus" => Self::Hiatus,
            _ => Self::Unknown,
        }
    }

    /// Only ongoing titles can produce new notifications.
    #[must_use]
    pub const fn is_ongoing(self) -> bool {
        matches!(self, Self::Ongoing)
    }
}

impl fmt::Display for AiringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Upcoming => "upcoming",
            Self::Cancelled => "cancelled",
            Self::Hiatus => "hiatus",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
