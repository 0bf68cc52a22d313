//! End-to-end reconciliation passes through the watch service.

mod common;

use common::{Harness, triple};
use shinchaku::domain::events::{EngineEvent, SessionScope, SkipReason};
use shinchaku::domain::{AiringStatus, AnimeId, UserId};
use shinchaku::constants::keys;
use shinchaku::services::{CheckOutcome, RemoteStore};
use std::time::Duration;
use tokio::sync::broadcast;

fn changed(outcome: &CheckOutcome) -> bool {
    matches!(outcome, CheckOutcome::Completed { changed: true, .. })
}

fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

async fn snapshot_of(h: &Harness, id: &str) -> Option<u32> {
    h.service
        .backend()
        .await
        .ledger
        .load_snapshot()
        .get(&AnimeId::new(id))
}

#[tokio::test]
async fn history_lifecycle_anonymous() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);

    assert!(changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("frieren", 14, 15)]);
    let first_seen = h.service.notifications().await[0].observed_at;

    // Same data again: nothing changes, observed_at untouched.
    assert!(!changed(&h.service.check_now(true).await));
    assert_eq!(h.service.notifications().await[0].observed_at, first_seen);

    // Two more episodes air before the user catches up.
    h.source.airing("frieren", 17);
    assert!(changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("frieren", 14, 17)]);

    h.watched("frieren", 17).await;
    assert!(changed(&h.service.check_now(true).await));
    assert!(h.live().await.is_empty());
}

#[tokio::test]
async fn bookmark_cold_start_then_delta() {
    let h = Harness::new(None).await;
    h.bookmarked("dandadan").await;
    h.source.airing("dandadan", 8);

    assert!(!changed(&h.service.check_now(true).await));
    assert!(h.live().await.is_empty());

    h.source.airing("dandadan", 9);
    assert!(changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("dandadan", 8, 9)]);

    assert!(!changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("dandadan", 8, 9)]);
}

#[tokio::test]
async fn history_baseline_beats_bookmark() {
    let h = Harness::new(None).await;
    h.bookmarked("apothecary").await;
    h.source.airing("apothecary", 3);
    h.service.check_now(true).await;

    h.watched("apothecary", 5).await;
    h.source.airing("apothecary", 6);
    h.service.check_now(true).await;

    assert_eq!(h.live().await, vec![triple("apothecary", 5, 6)]);
}

#[tokio::test]
async fn finished_titles_do_not_notify() {
    let h = Harness::new(None).await;
    h.watched("bebop", 3).await;
    h.source.set("bebop", 26, AiringStatus::Completed);

    assert!(!changed(&h.service.check_now(true).await));
    assert!(h.live().await.is_empty());
}

#[tokio::test]
async fn probe_failure_keeps_existing_notifications() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);
    h.service.check_now(true).await;

    h.source.fail(true);
    let outcome = h.service.check_now(true).await;

    assert!(matches!(outcome, CheckOutcome::Completed { changed: false, .. }));
    assert_eq!(h.live().await, vec![triple("frieren", 14, 15)]);
}

#[tokio::test]
async fn automatic_checks_are_throttled() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);

    assert!(matches!(
        h.service.check_now(false).await,
        CheckOutcome::Completed { .. }
    ));
    assert_eq!(
        h.service.check_now(false).await,
        CheckOutcome::Skipped(SkipReason::Throttled)
    );
    assert_eq!(h.source.calls(), 1);

    assert!(matches!(
        h.service.check_now(true).await,
        CheckOutcome::Completed { .. }
    ));
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test]
async fn overlapping_checks_are_skipped() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);
    let gate = h.source.hold();

    let service = h.service.clone();
    let first = tokio::spawn(async move { service.check_now(true).await });

    for _ in 0..100 {
        if h.service.is_checking() && h.source.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.service.is_checking());

    assert_eq!(
        h.service.check_now(true).await,
        CheckOutcome::Skipped(SkipReason::InFlight)
    );

    gate.notify_one();
    let outcome = first.await.unwrap();
    assert!(changed(&outcome));
    assert!(!h.service.is_checking());
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn disposed_service_skips_checks() {
    let h = Harness::new(None).await;
    h.service.dispose();
    assert_eq!(
        h.service.check_now(true).await,
        CheckOutcome::Skipped(SkipReason::Disposed)
    );
}

#[tokio::test]
async fn dismiss_and_dismiss_all_publish_changes() {
    let h = Harness::new(None).await;
    h.watched("a", 1).await;
    h.watched("b", 1).await;
    h.watched("c", 1).await;
    for id in ["a", "b", "c"] {
        h.source.airing(id, 2);
    }
    h.service.check_now(true).await;
    assert_eq!(h.live().await.len(), 3);

    let mut events = h.bus.subscribe();
    h.service.dismiss(&AnimeId::new("b")).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        EngineEvent::NotificationsChanged {
            scope: SessionScope::Anonymous
        }
    );
    assert_eq!(h.live().await, vec![triple("a", 1, 2), triple("c", 1, 2)]);

    h.service.dismiss_all().await.unwrap();
    assert!(h.live().await.is_empty());
    assert!(h.service.notifications().await.is_empty());
}

#[tokio::test]
async fn check_emits_lifecycle_events() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);

    let mut events = h.bus.subscribe();
    h.service.check_now(true).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            EngineEvent::CheckStarted { forced: true },
            EngineEvent::NotificationsChanged {
                scope: SessionScope::Anonymous
            },
            EngineEvent::CheckFinished {
                changed: true,
                active: 1
            },
        ]
    );
}

#[tokio::test]
async fn backends_are_isolated() {
    let h = Harness::new(None).await;
    h.watched("local-only", 1).await;
    h.source.airing("local-only", 2);
    h.service.check_now(true).await;
    assert_eq!(h.live().await, vec![triple("local-only", 1, 2)]);

    h.service
        .switch_session(Some(UserId::new("alice")))
        .await
        .unwrap();
    assert!(h.live().await.is_empty());

    h.watched("remote-only", 4).await;
    h.source.airing("remote-only", 5);
    h.service.check_now(true).await;
    assert_eq!(h.live().await, vec![triple("remote-only", 4, 5)]);

    h.service.switch_session(None).await.unwrap();
    assert_eq!(h.live().await, vec![triple("local-only", 1, 2)]);

    let alice = h.store.list_notifications(&UserId::new("alice")).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].anime_id.as_str(), "remote-only");
}

#[tokio::test]
async fn remote_backend_retires_rows_on_catch_up() {
    let h = Harness::new(Some("bob")).await;
    let bob = UserId::new("bob");
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);

    h.service.check_now(true).await;
    assert_eq!(h.store.list_notifications(&bob).await.unwrap().len(), 1);

    assert!(!changed(&h.service.check_now(true).await));

    h.watched("frieren", 15).await;
    assert!(changed(&h.service.check_now(true).await));
    assert!(h.store.list_notifications(&bob).await.unwrap().is_empty());
    assert!(h.live().await.is_empty());
}

#[tokio::test]
async fn remote_reload_sees_other_writers() {
    let h = Harness::new(Some("carol")).await;
    let carol = UserId::new("carol");

    let other_tab = shinchaku::models::Notification {
        anime_id: AnimeId::new("elsewhere"),
        anime_title: "Written elsewhere".to_string(),
        old_episode: 2,
        new_episode: 3,
        total_episodes: None,
        observed_at: chrono::Utc::now(),
    };
    h.store
        .upsert_notifications(&carol, &[other_tab])
        .await
        .unwrap();

    assert!(h.live().await.is_empty());
    h.service.reload().await.unwrap();
    assert_eq!(h.live().await, vec![triple("elsewhere", 2, 3)]);
}

#[tokio::test]
async fn failed_save_keeps_the_bookmark_delta_for_the_next_pass() {
    let h = Harness::new(None).await;
    h.bookmarked("dandadan").await;
    h.source.airing("dandadan", 8);
    h.service.check_now(true).await;
    assert_eq!(snapshot_of(&h, "dandadan").await, Some(8));

    h.source.airing("dandadan", 9);
    h.storage.break_writes(keys::NOTIFICATIONS);
    let mut events = h.bus.subscribe();

    assert_eq!(h.service.check_now(true).await, CheckOutcome::Failed);
    assert!(h.live().await.is_empty());
    assert_eq!(snapshot_of(&h, "dandadan").await, Some(8));
    assert_eq!(
        drain(&mut events),
        vec![EngineEvent::CheckStarted { forced: true }]
    );

    h.storage.heal();
    assert!(changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("dandadan", 8, 9)]);
    assert_eq!(snapshot_of(&h, "dandadan").await, Some(9));
}

#[tokio::test]
async fn failed_save_leaves_live_notifications_untouched() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);
    h.service.check_now(true).await;

    h.source.airing("frieren", 16);
    h.storage.break_writes(keys::NOTIFICATIONS);
    let mut events = h.bus.subscribe();

    assert_eq!(h.service.check_now(true).await, CheckOutcome::Failed);
    assert_eq!(h.live().await, vec![triple("frieren", 14, 15)]);
    let seen = drain(&mut events);
    assert!(!seen.iter().any(|e| matches!(
        e,
        EngineEvent::NotificationsChanged { .. } | EngineEvent::CheckFinished { .. }
    )));

    h.storage.heal();
    assert!(changed(&h.service.check_now(true).await));
    assert_eq!(h.live().await, vec![triple("frieren", 14, 16)]);
}

#[tokio::test]
async fn failed_dismiss_keeps_the_cache() {
    let h = Harness::new(None).await;
    h.watched("a", 1).await;
    h.watched("b", 1).await;
    h.source.airing("a", 2);
    h.source.airing("b", 2);
    h.service.check_now(true).await;

    h.storage.break_writes(keys::NOTIFICATIONS);
    let mut events = h.bus.subscribe();

    assert!(h.service.dismiss(&AnimeId::new("a")).await.is_err());
    assert!(h.service.dismiss_all().await.is_err());
    assert_eq!(h.live().await, vec![triple("a", 1, 2), triple("b", 1, 2)]);
    assert!(drain(&mut events).is_empty());

    h.storage.heal();
    h.service.dismiss(&AnimeId::new("a")).await.unwrap();
    assert_eq!(h.live().await, vec![triple("b", 1, 2)]);
}

#[tokio::test]
async fn remote_pass_keeps_rows_written_by_another_device() {
    let h = Harness::new(Some("erin")).await;
    let erin = UserId::new("erin");
    h.watched("x", 1).await;
    h.watched("z", 1).await;
    h.source.airing("x", 2);
    h.source.airing("z", 2);
    h.service.check_now(true).await;

    // Catching up on x retires it; the pass is parked at its first write,
    // after it has loaded the remote rows.
    h.watched("x", 2).await;
    let (reached, release) = h.remote.hold_next_upsert();
    let service = h.service.clone();
    let pass = tokio::spawn(async move { service.check_now(true).await });
    tokio::time::timeout(Duration::from_secs(5), reached.notified())
        .await
        .expect("pass never reached its write");

    let elsewhere = shinchaku::models::Notification {
        anime_id: AnimeId::new("y"),
        anime_title: "Other device".to_string(),
        old_episode: 3,
        new_episode: 4,
        total_episodes: None,
        observed_at: chrono::Utc::now(),
    };
    h.store.upsert_notifications(&erin, &[elsewhere]).await.unwrap();

    release.notify_one();
    assert!(changed(&pass.await.unwrap()));

    let mut remote: Vec<_> = h
        .store
        .list_notifications(&erin)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.anime_id.into_inner())
        .collect();
    remote.sort();
    assert_eq!(remote, vec!["y".to_string(), "z".to_string()]);
}
