//! Freshness probing against the external episode source.
//!
//! The prober never fails: a broken probe must not interrupt the caller or
//! clear existing notifications, so every error collapses to an empty result.

use crate::constants::limits::PROBE_BATCH_LIMIT;
use crate::domain::AnimeId;
use crate::models::FreshRecord;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Episode source error: {0}")]
    Api(String),
}

/// The external "fresh episode" lookup.
#[async_trait::async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Current published episode counts for a batch of anime.
    ///
    /// Partial results are allowed; unknown IDs are simply absent.
    async fn fetch_current_episode_counts(
        &self,
        ids: &[AnimeId],
    ) -> Result<Vec<FreshRecord>, ProbeError>;
}

#[derive(Clone)]
pub struct FreshnessProber {
    source: Arc<dyn EpisodeSource>,
    batch_limit: usize,
}

impl FreshnessProber {
    #[must_use]
    pub fn new(source: Arc<dyn EpisodeSource>) -> Self {
        Self::with_batch_limit(source, PROBE_BATCH_LIMIT)
    }

    #[must_use]
    pub fn with_batch_limit(source: Arc<dyn EpisodeSource>, batch_limit: usize) -> Self {
        Self {
            source,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Probes the first `batch_limit` unique IDs, preserving input order.
    pub async fn probe(&self, anime_ids: &[AnimeId]) -> Vec<FreshRecord> {
        let mut seen = HashSet::new();
        let batch: Vec<AnimeId> = anime_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .take(self.batch_limit)
            .cloned()
            .collect();

        if batch.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        match self.source.fetch_current_episode_counts(&batch).await {
            Ok(records) => {
                debug!(
                    requested = batch.len(),
                    received = records.len(),
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Probed episode source"
                );
                records
            }
            Err(e) => {
                metrics::counter!("shinchaku_probe_failures_total").increment(1);
                warn!(error = %e, requested = batch.len(), "Episode probe failed");
                Vec::new()
            }
        }
    }
}
