//! Episode-delta reconciliation.
//!
//! [`reconcile`] is pure: given the watch set, fresh episode counts, the prior
//! notification set and the bookmark snapshot, it computes the next
//! notification set and snapshot. Persistence and event emission are the
//! caller's job and are gated on [`ReconcileOutcome::changed`].
//!
//! Per-anime lifecycle: `absent -> active -> active (upgraded) -> absent`.

use crate::domain::{AnimeId, Provenance};
use crate::models::{BookmarkSnapshot, FreshRecord, Notification, WatchItem};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub notifications: Vec<Notification>,
    pub snapshot: BookmarkSnapshot,
    /// The notification set differs from the prior one.
    pub changed: bool,
    pub snapshot_changed: bool,
    pub created: Vec<AnimeId>,
    pub upgraded: Vec<AnimeId>,
    pub retired: Vec<AnimeId>,
}

/// Runs one reconciliation pass.
///
/// - Only `Ongoing` titles create notifications. A title that stopped airing
///   can still upgrade a live notification to its final episode, and catch-up
///   retirement ignores status.
/// - Bookmark-only titles seed the snapshot on first sight and never notify
///   on that pass.
/// - Re-running with the same input is a no-op: `observed_at` is untouched
///   and `changed` is false.
/// - Fresh records without a usable episode count are skipped.
#[must_use]
pub fn reconcile(
    watch_set: &[WatchItem],
    fresh: &[FreshRecord],
    prior: &[Notification],
    prior_snapshot: &BookmarkSnapshot,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    let watched = index_watch_set(watch_set);

    let mut notifications = prior.to_vec();
    let mut snapshot = prior_snapshot.clone();
    let mut outcome_created = Vec::new();
    let mut outcome_upgraded = Vec::new();
    let mut outcome_retired = Vec::new();
    let mut snapshot_changed = false;
    let mut processed = HashSet::new();

    for record in fresh {
        if !processed.insert(&record.id) {
            continue;
        }

        let Some(item) = watched.get(&record.id) else {
            continue;
        };

        let Some(current) = record.current_episode else {
            debug!(anime_id = %record.id, "Skipping fresh record without an episode count");
            continue;
        };

        let existing = notifications
            .iter()
            .position(|n| n.anime_id == record.id);
        let ongoing = record.status.is_ongoing();

        if !ongoing && existing.is_none() {
            continue;
        }

        let baseline = match item.provenance {
            Provenance::History => item.baseline_episode,
            Provenance::Bookmark => {
                if let Some(observed) = snapshot.get(&record.id) {
                    observed
                } else {
                    // First sight of a bookmark: remember where it stands, never notify.
                    snapshot_changed |= snapshot.record(&record.id, current);
                    continue;
                }
            }
        };

        if current > baseline {
            match existing {
                None => {
                    notifications.insert(
                        0,
                        Notification {
                            anime_id: record.id.clone(),
                            anime_title: display_title(record, item, None),
                            old_episode: baseline,
                            new_episode: current,
                            total_episodes: record.total_episodes,
                            observed_at: now,
                        },
                    );
                    outcome_created.push(record.id.clone());
                }
                Some(idx) if notifications[idx].new_episode < current => {
                    let previous = &notifications[idx];
                    // A bookmark baseline is the snapshot we advanced ourselves, not
                    // viewing progress, so the originally detected start is kept.
                    let old_episode = match item.provenance {
                        Provenance::History => baseline,
                        Provenance::Bookmark => previous.old_episode.min(baseline),
                    };
                    notifications[idx] = Notification {
                        anime_id: record.id.clone(),
                        anime_title: display_title(record, item, Some(previous)),
                        old_episode,
                        new_episode: current,
                        total_episodes: record.total_episodes.or(previous.total_episodes),
                        observed_at: now,
                    };
                    outcome_upgraded.push(record.id.clone());
                }
                Some(_) => {}
            }

            if item.provenance == Provenance::Bookmark {
                snapshot_changed |= snapshot.record(&record.id, current);
            }
        } else if current == baseline {
            // Only history reflects viewing progress. A bookmark baseline equals
            // the current count right after we flagged it, which is not a catch-up.
            if item.provenance == Provenance::History
                && let Some(idx) = existing
            {
                notifications.remove(idx);
                outcome_retired.push(record.id.clone());
            }
        } else {
            debug!(
                anime_id = %record.id,
                current,
                baseline,
                "Episode count went backwards; ignoring"
            );
        }
    }

    let changed =
        !outcome_created.is_empty() || !outcome_upgraded.is_empty() || !outcome_retired.is_empty();

    ReconcileOutcome {
        notifications,
        snapshot,
        changed,
        snapshot_changed,
        created: outcome_created,
        upgraded: outcome_upgraded,
        retired: outcome_retired,
    }
}

/// Keys the watch set by anime, letting History win over Bookmark.
fn index_watch_set(watch_set: &[WatchItem]) -> HashMap<&AnimeId, &WatchItem> {
    let mut watched: HashMap<&AnimeId, &WatchItem> = HashMap::with_capacity(watch_set.len());
    for item in watch_set {
        watched
            .entry(&item.anime_id)
            .and_modify(|slot| {
                if slot.provenance == Provenance::Bookmark && item.provenance == Provenance::History
                {
                    *slot = item;
                }
            })
            .or_insert(item);
    }
    watched
}

fn display_title(record: &FreshRecord, item: &WatchItem, previous: Option<&Notification>) -> String {
    record
        .title
        .clone()
        .or_else(|| item.title.clone())
        .or_else(|| previous.map(|n| n.anime_title.clone()))
        .unwrap_or_else(|| record.id.to_string())
}
