pub mod prelude;

pub mod bookmarks;
pub mod episode_notifications;
pub mod watch_history;
