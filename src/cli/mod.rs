//! CLI module - Command-line interface for Shinchaku
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Shinchaku - New episode notifications for the anime you watch
#[derive(Parser)]
#[command(name = "shinchaku")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as background daemon with scheduler
    #[command(alias = "d")]
    Daemon,

    /// Check for new episodes once
    #[command(alias = "c")]
    Check {
        /// Ignore the 15 minute throttle
        #[arg(long, short)]
        force: bool,
    },

    /// List pending new-episode notifications
    #[command(alias = "n", alias = "ls")]
    Notifications,

    /// Dismiss the notification for one anime
    #[command(alias = "rm")]
    Dismiss {
        /// Anime ID
        anime_id: String,
    },

    /// Dismiss every notification
    DismissAll,

    /// Record that an episode was watched
    #[command(alias = "w")]
    Watch {
        /// Anime ID
        anime_id: String,
        /// Episode number just watched
        episode: u32,
        /// Title to show in notifications
        #[arg(long)]
        title: Option<String>,
    },

    /// Manage bookmarks
    #[command(alias = "b")]
    Bookmark {
        #[command(subcommand)]
        command: BookmarkCommands,
    },

    /// Show recent viewing history
    #[command(alias = "h")]
    History {
        /// Number of entries to show
        #[arg(default_value = "10")]
        limit: usize,
    },

    /// Sign in; notifications then sync with the remote store
    Login {
        /// User ID
        user_id: String,
    },

    /// Sign out and return to local notifications
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Create default config file
    Init,
}

#[derive(Subcommand)]
pub enum BookmarkCommands {
    /// Bookmark an anime
    Add {
        /// Anime ID
        anime_id: String,
        /// Display title
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove a bookmark
    #[command(alias = "rm")]
    Remove {
        /// Anime ID
        anime_id: String,
    },
    /// List bookmarks
    #[command(alias = "ls")]
    List,
}

pub use commands::*;
