//! Per-session backend selection.
//!
//! The auth signal is consulted once, here. Everything downstream works
//! against the traits and never branches on whether a user is signed in.

use crate::constants::keys;
use crate::domain::UserId;
use crate::domain::events::SessionScope;
use crate::services::collector::{LocalWatchSource, RemoteWatchSource, WatchSetSource};
use crate::services::library::{LibraryStore, LocalLibraryStore, RemoteLibraryStore};
use crate::services::notification_store::{
    LocalNotificationStore, NotificationStore, RemoteNotificationStore, SnapshotStore,
};
use crate::services::remote_store::RemoteStore;
use crate::storage::{BlobStorage, StorageError, read_json, write_json};
use std::sync::Arc;

/// Everything one session reads from and writes to.
#[derive(Clone)]
pub struct SessionBackend {
    user: Option<UserId>,
    pub watch_source: Arc<dyn WatchSetSource>,
    pub notifications: Arc<dyn NotificationStore>,
    pub library: Arc<dyn LibraryStore>,
    pub ledger: Arc<SnapshotStore>,
}

impl SessionBackend {
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn scope(&self) -> SessionScope {
        scope_for(self.user.as_ref())
    }
}

#[must_use]
pub fn scope_for(user: Option<&UserId>) -> SessionScope {
    user.map_or(SessionScope::Anonymous, |u| SessionScope::User(u.to_string()))
}

/// Builds a [`SessionBackend`] for whoever is signed in.
#[derive(Clone)]
pub struct SessionFactory {
    storage: Arc<dyn BlobStorage>,
    remote: Arc<dyn RemoteStore>,
    history_limit: usize,
}

impl SessionFactory {
    #[must_use]
    pub fn new(
        storage: Arc<dyn BlobStorage>,
        remote: Arc<dyn RemoteStore>,
        history_limit: usize,
    ) -> Self {
        Self {
            storage,
            remote,
            history_limit: history_limit.max(1),
        }
    }

    #[must_use]
    pub fn storage(&self) -> Arc<dyn BlobStorage> {
        Arc::clone(&self.storage)
    }

    #[must_use]
    pub fn for_user(&self, user: Option<UserId>) -> SessionBackend {
        let ledger = Arc::new(SnapshotStore::new(Arc::clone(&self.storage), user.as_ref()));

        match user {
            None => SessionBackend {
                user: None,
                watch_source: Arc::new(LocalWatchSource::new(
                    Arc::clone(&self.storage),
                    self.history_limit,
                )),
                notifications: Arc::new(LocalNotificationStore::new(Arc::clone(&self.storage))),
                library: Arc::new(LocalLibraryStore::new(Arc::clone(&self.storage))),
                ledger,
            },
            Some(user) => SessionBackend {
                watch_source: Arc::new(RemoteWatchSource::new(
                    Arc::clone(&self.remote),
                    user.clone(),
                    self.history_limit,
                )),
                notifications: Arc::new(RemoteNotificationStore::new(
                    Arc::clone(&self.remote),
                    user.clone(),
                )),
                library: Arc::new(RemoteLibraryStore::new(Arc::clone(&self.remote), user.clone())),
                user: Some(user),
                ledger,
            },
        }
    }
}

/// The signed-in user persisted for the command line, if any.
pub fn load_session(storage: &dyn BlobStorage) -> Result<Option<UserId>, StorageError> {
    read_json(storage, keys::SESSION)
}

pub fn save_session(storage: &dyn BlobStorage, user: Option<&UserId>) -> Result<(), StorageError> {
    match user {
        Some(user) => write_json(storage, keys::SESSION, user),
        None => storage.remove(keys::SESSION),
    }
}
