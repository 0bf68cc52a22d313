//! Scheduler triggers driving the watch service.

mod common;

use common::{Harness, triple};
use shinchaku::config::WatcherConfig;
use shinchaku::domain::UserId;
use shinchaku::domain::events::{EngineEvent, SessionScope};
use shinchaku::services::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        startup_delay_ms: 10,
        ..WatcherConfig::default()
    }
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn startup_pass_then_requested_checks() {
    let h = Harness::new(None).await;
    h.watched("frieren", 14).await;
    h.source.airing("frieren", 15);

    let (scheduler, trigger) = Scheduler::new(Arc::clone(&h.service), fast_config(), None);
    let scheduler = Arc::new(scheduler);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await })
    };

    wait_for(|| async { h.live().await == vec![triple("frieren", 14, 15)] }).await;
    assert_eq!(h.source.calls(), 1);

    // The startup pass stamped the throttle; a requested check is forced through it.
    h.source.airing("frieren", 16);
    trigger.request_check();
    wait_for(|| async { h.live().await == vec![triple("frieren", 14, 16)] }).await;
    assert_eq!(h.source.calls(), 2);

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("scheduler did not stop")
        .unwrap()
        .unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn auth_changes_switch_the_session() {
    let h = Harness::new(None).await;
    let (auth_tx, auth_rx) = watch::channel(None);
    let (scheduler, _trigger) = Scheduler::new(
        Arc::clone(&h.service),
        WatcherConfig {
            startup_delay_ms: 60_000,
            ..WatcherConfig::default()
        },
        Some(auth_rx),
    );
    let scheduler = Arc::new(scheduler);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await })
    };

    let mut events = h.bus.subscribe();
    auth_tx.send(Some(UserId::new("dana"))).unwrap();

    wait_for(|| async {
        h.service.scope().await == SessionScope::User("dana".to_string())
    })
    .await;

    let switched = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(EngineEvent::SessionChanged { scope }) = events.recv().await {
                return scope;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(switched, SessionScope::User("dana".to_string()));

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn login_migrated_reloads_notifications() {
    let h = Harness::new(None).await;
    let (scheduler, trigger) = Scheduler::new(
        Arc::clone(&h.service),
        WatcherConfig {
            startup_delay_ms: 60_000,
            ..WatcherConfig::default()
        },
        None,
    );
    let scheduler = Arc::new(scheduler);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await })
    };

    // Another writer fills the local blob behind the service's back.
    let written = vec![shinchaku::models::Notification {
        anime_id: shinchaku::domain::AnimeId::new("migrated"),
        anime_title: "Migrated".to_string(),
        old_episode: 1,
        new_episode: 2,
        total_episodes: None,
        observed_at: chrono::Utc::now(),
    }];
    shinchaku::storage::write_json(
        h.storage.as_ref(),
        shinchaku::constants::keys::NOTIFICATIONS,
        &written,
    )
    .unwrap();

    trigger.login_migrated();
    wait_for(|| async { h.live().await == vec![triple("migrated", 1, 2)] }).await;

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn second_start_is_rejected() {
    let h = Harness::new(None).await;
    let (scheduler, _trigger) = Scheduler::new(Arc::clone(&h.service), fast_config(), None);
    let scheduler = Arc::new(scheduler);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.start().await })
    };

    wait_for(|| async { scheduler.is_running().await }).await;
    assert!(scheduler.start().await.is_err());

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
