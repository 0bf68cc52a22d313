pub mod notification;
pub mod watch;

pub use notification::{BookmarkSnapshot, Notification};
pub use watch::{BookmarkEntry, FreshRecord, HistoryEntry, WatchItem};
