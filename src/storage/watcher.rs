//! Detects writes to shared blobs made by other processes.
//!
//! Several processes may share one data directory the way browser tabs share
//! local storage. This watcher turns their writes into
//! [`EngineEvent::StorageChanged`]; writes made through our own
//! [`FileBlobStorage`] handle are filtered out.

use super::{BlobStorage, FileBlobStorage, StorageError};
use crate::constants::intervals::STORAGE_DEBOUNCE;
use crate::domain::events::EngineEvent;
use crate::services::event_bus::EventBus;
use notify_debouncer_mini::notify;
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct StorageWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl StorageWatcher {
    /// Watches `storage`'s directory for changes to any of `keys`.
    pub fn start(
        storage: Arc<FileBlobStorage>,
        keys: impl IntoIterator<Item = String>,
        bus: EventBus,
    ) -> Result<Self, StorageError> {
        let keys: HashSet<String> = keys.into_iter().collect();
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut debouncer = new_debouncer(STORAGE_DEBOUNCE, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        if let Err(e) = tx.send(event.path) {
                            debug!(path = %e.0.display(), "Storage change dropped; watcher task stopped");
                        }
                    }
                }
                Err(e) => warn!(error = ?e, "Storage watcher error"),
            }
        })
        .map_err(|e| StorageError::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(storage.dir(), notify::RecursiveMode::NonRecursive)
            .map_err(|e| StorageError::Watch(e.to_string()))?;

        info!(dir = %storage.dir().display(), "Watching local storage for external changes");

        let task = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                let Some(key) = FileBlobStorage::key_for_path(&path) else {
                    continue;
                };
                if !keys.contains(&key) {
                    continue;
                }

                let current = match storage.get(&key) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to read changed blob");
                        continue;
                    }
                };

                if storage.is_own_write(&key, current.as_deref()) {
                    continue;
                }

                debug!(key = %key, "Blob changed by another process");
                bus.publish(EngineEvent::StorageChanged { key });
            }
        });

        Ok(Self {
            _debouncer: debouncer,
            task,
        })
    }

    pub fn stop(self) {
        self.task.abort();
    }
}
