//! Domain events for the episode watcher.
//!
//! Events are sent via the event bus so observers can re-read state. They
//! carry no notification payloads: receivers pull the current list from the
//! service, which keeps every observer consistent with the active backend.

use serde::Serialize;

/// Which backend owns the notification set an event refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "lowercase")]
pub enum SessionScope {
    Anonymous,
    User(String),
}

impl std::fmt::Display for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    Throttled,
    Disposed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The notification set was written; observers should reload it.
    NotificationsChanged { scope: SessionScope },

    /// Another process rewrote a shared storage key.
    StorageChanged { key: String },

    /// The active backend changed (login or logout).
    SessionChanged { scope: SessionScope },

    CheckStarted { forced: bool },
    CheckFinished { changed: bool, active: usize },
    CheckSkipped { reason: SkipReason },
}
