pub use super::bookmarks::Entity as Bookmarks;
pub use super::episode_notifications::Entity as EpisodeNotifications;
pub use super::watch_history::Entity as WatchHistory;
