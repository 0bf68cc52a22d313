use crate::domain::{AiringStatus, AnimeId};
use crate::models::FreshRecord;
use crate::services::prober::{EpisodeSource, ProbeError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const ANILIST_API: &str = "https://graphql.anilist.co";

const EPISODE_COUNTS_QUERY: &str = r"
    query ($ids: [Int], $perPage: Int) {
        Page(page: 1, perPage: $perPage) {
            media(id_in: $ids, type: ANIME) {
                id
                title { romaji english }
                episodes
                status
                nextAiringEpisode { episode }
            }
        }
    }
";

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    ids: &'a [i32],
    #[serde(rename = "perPage")]
    per_page: usize,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    id: i32,
    title: Title,
    episodes: Option<i32>,
    status: Option<String>,
    #[serde(rename = "nextAiringEpisode")]
    next_airing_episode: Option<NextAiringEpisode>,
}

#[derive(Deserialize)]
struct NextAiringEpisode {
    episode: i32,
}

#[derive(Deserialize)]
struct Title {
    romaji: Option<String>,
    english: Option<String>,
}

/// Batch lookup of current episode counts against AniList.
#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    api_url: String,
}

impl Default for AnilistClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AnilistClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("Shinchaku/1.0")
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_url: ANILIST_API.to_string(),
        }
    }

    pub fn with_timeout(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent("Shinchaku/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl EpisodeSource for AnilistClient {
    async fn fetch_current_episode_counts(
        &self,
        ids: &[AnimeId],
    ) -> Result<Vec<FreshRecord>, ProbeError> {
        let numeric: Vec<i32> = ids
            .iter()
            .filter_map(|id| match id.as_str().parse::<i32>() {
                Ok(n) => Some(n),
                Err(_) => {
                    debug!(anime_id = %id, "Skipping non-AniList anime id");
                    None
                }
            })
            .collect();

        if numeric.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = GraphQLRequest {
            query: EPISODE_COUNTS_QUERY,
            variables: Variables {
                ids: &numeric,
                per_page: numeric.len(),
            },
        };

        let response: GraphQLResponse = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.data {
            Some(data) => Ok(data.page.media.into_iter().map(map_media).collect()),
            None => {
                let message = response
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(ProbeError::Api(message))
            }
        }
    }
}

fn map_media(m: Media) -> FreshRecord {
    let status = m
        .status
        .as_deref()
        .map_or(AiringStatus::Unknown, AiringStatus::parse);
    let total_episodes = m.episodes.and_then(|e| u32::try_from(e).ok());

    FreshRecord {
        id: AnimeId::new(m.id.to_string()),
        title: m.title.english.or(m.title.romaji),
        current_episode: current_episode(status, m.next_airing_episode.as_ref(), total_episodes),
        total_episodes,
        status,
    }
}

/// Latest aired episode: one before the next scheduled one while airing,
/// the full count once finished.
fn current_episode(
    status: AiringStatus,
    next: Option<&NextAiringEpisode>,
    total: Option<u32>,
) -> Option<u32> {
    if let Some(next) = next {
        return u32::try_from(next.episode.saturating_sub(1)).ok();
    }

    match status {
        AiringStatus::Upcoming => Some(0),
        AiringStatus::Completed | AiringStatus::Cancelled => total,
        _ => None,
    }
}
