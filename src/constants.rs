/// Local blob keys. Per-session keys get a `:<user>` suffix when authenticated.
pub mod keys {
    pub const WATCH_HISTORY: &str = "watch_history";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const NOTIFICATIONS: &str = "episode_notifications";
    pub const BOOKMARK_SNAPSHOT: &str = "bookmark_snapshot";
    pub const LAST_UPDATE_CHECK: &str = "last_update_check";
    pub const SESSION: &str = "session";
}

pub mod intervals {
    use std::time::Duration;

    /// Floor for automatic checks against the episode source.
    pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

    pub const STORAGE_DEBOUNCE: Duration = Duration::from_millis(250);
}

pub mod limits {
    pub const HISTORY_WATCH_LIMIT: usize = 30;

    pub const LOCAL_HISTORY_CAP: usize = 100;

    pub const PROBE_BATCH_LIMIT: usize = 50;
}
