pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, watch};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{
    BookmarkCommands, Cli, Commands, cmd_bookmark_add, cmd_bookmark_list, cmd_bookmark_remove,
    cmd_check, cmd_dismiss, cmd_dismiss_all, cmd_history, cmd_login, cmd_logout,
    cmd_notifications, cmd_watch, cmd_whoami, print_notifications,
};
pub use config::Config;
use constants::keys;
use domain::UserId;
use domain::events::EngineEvent;
use services::session::load_session;
use services::{CheckTrigger, NotificationFeed, Scheduler};
use state::AppState;
use storage::{FileBlobStorage, StorageWatcher};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let mut log_level = config.general.log_level.clone();
    if config.general.suppress_connection_errors {
        log_level.push_str(",reqwest::retry=off,hyper_util=off");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder
            .extra_field("env", "production")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Created config.toml with defaults");
            } else {
                println!("config.toml already exists");
            }
            Ok(())
        }

        Commands::Daemon => run_daemon(config).await,

        command => {
            let state = AppState::new(config).await?;
            dispatch(&state, command).await
        }
    }
}

async fn dispatch(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Check { force } => cmd_check(state, force).await,
        Commands::Notifications => cmd_notifications(state).await,
        Commands::Dismiss { anime_id } => cmd_dismiss(state, &anime_id).await,
        Commands::DismissAll => cmd_dismiss_all(state).await,
        Commands::Watch {
            anime_id,
            episode,
            title,
        } => cmd_watch(state, &anime_id, episode, title).await,
        Commands::Bookmark { command } => match command {
            BookmarkCommands::Add { anime_id, title } => {
                cmd_bookmark_add(state, &anime_id, title).await
            }
            BookmarkCommands::Remove { anime_id } => cmd_bookmark_remove(state, &anime_id).await,
            BookmarkCommands::List => cmd_bookmark_list(state).await,
        },
        Commands::History { limit } => cmd_history(state, limit).await,
        Commands::Login { user_id } => cmd_login(state, &user_id).await,
        Commands::Logout => cmd_logout(state).await,
        Commands::Whoami => cmd_whoami(state).await,
        Commands::Init | Commands::Daemon => Ok(()),
    }
}

fn install_metrics(config: &Config) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let builder = PrometheusBuilder::new();
    if let Some(port) = config.observability.metrics_port {
        builder
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to start Prometheus exporter")?;
        info!("Prometheus metrics exporter listening on port {}", port);
    } else {
        builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
    }
    Ok(())
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "Shinchaku v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        install_metrics(&config)?;
    }

    let state = AppState::new(config.clone()).await?;
    let service = Arc::clone(&state.service);

    let (feed, mut feed_rx) = NotificationFeed::new(Arc::clone(&service));
    let feed_handle = state.event_bus.attach(feed);
    let printer_handle = tokio::spawn(async move {
        while feed_rx.changed().await.is_ok() {
            let latest = feed_rx.borrow_and_update().clone();
            print_notifications(&latest);
        }
    });

    if let Err(e) = service.init().await {
        warn!(error = %e, "Starting without stored notifications");
    }

    let (auth_tx, auth_rx) = watch::channel(service.current_user().await);
    let (scheduler, trigger) =
        Scheduler::new(Arc::clone(&service), config.watcher.clone(), Some(auth_rx));
    let scheduler = Arc::new(scheduler);

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    let bridge_handle = tokio::spawn(bridge_storage_events(
        state.event_bus.subscribe(),
        Arc::clone(&state.storage),
        auth_tx,
        trigger,
    ));

    let storage_watcher = if config.watcher.watch_storage {
        let watched = [
            keys::NOTIFICATIONS,
            keys::WATCH_HISTORY,
            keys::BOOKMARKS,
            keys::SESSION,
        ]
        .map(String::from);

        match StorageWatcher::start(Arc::clone(&state.storage), watched, state.event_bus.clone())
        {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Cross-process storage sync disabled");
                None
            }
        }
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    if let Err(e) = scheduler_handle.await {
        warn!("Scheduler task ended abnormally: {}", e);
    }
    service.dispose();

    if let Some(watcher) = storage_watcher {
        watcher.stop();
    }
    bridge_handle.abort();
    feed_handle.abort();
    printer_handle.abort();
    info!("Daemon stopped");

    Ok(())
}

/// Turns writes by other processes into engine inputs: a new saved session
/// becomes the auth signal, and new watch data asks for a forced check.
async fn bridge_storage_events(
    mut events: broadcast::Receiver<EngineEvent>,
    storage: Arc<FileBlobStorage>,
    auth: watch::Sender<Option<UserId>>,
    trigger: CheckTrigger,
) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::StorageChanged { key }) => match key.as_str() {
                keys::SESSION => match load_session(storage.as_ref()) {
                    Ok(user) => {
                        auth.send_if_modified(|current| {
                            if *current == user {
                                false
                            } else {
                                *current = user;
                                true
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to read changed session"),
                },
                keys::WATCH_HISTORY | keys::BOOKMARKS => trigger.request_check(),
                _ => {}
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!(count, "Storage bridge lagged behind engine events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
