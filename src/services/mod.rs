pub mod collector;
pub use collector::{LocalWatchSource, RemoteWatchSource, WatchSetSource, merge_watch_set};

pub mod event_bus;
pub use event_bus::{EventBus, EventObserver};

pub mod feed;
pub use feed::NotificationFeed;

pub mod library;
pub use library::{CheckTrigger, LibraryStore, TriggerSignal, WatchLibrary};

pub mod notification_store;
pub use notification_store::{
    LocalNotificationStore, NotificationStore, RemoteNotificationStore, SnapshotStore,
};

pub mod prober;
pub use prober::{EpisodeSource, FreshnessProber, ProbeError};

pub mod reconciler;
pub use reconciler::{ReconcileOutcome, reconcile};

pub mod remote_store;
pub use remote_store::{RemoteStore, RemoteStoreError};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod session;
pub use session::{SessionBackend, SessionFactory};

pub mod watch_service;
pub use watch_service::{CheckOutcome, EpisodeWatchService, WatchError};
