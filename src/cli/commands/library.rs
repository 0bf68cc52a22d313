//! History and bookmark command handlers

use crate::domain::AnimeId;
use crate::state::AppState;

pub async fn cmd_watch(
    state: &AppState,
    anime_id: &str,
    episode: u32,
    title: Option<String>,
) -> anyhow::Result<()> {
    state
        .library(None)
        .record_watch(AnimeId::new(anime_id), title, episode)
        .await?;
    println!("✓ Recorded episode {episode} of {anime_id}");

    // A running daemon picks the change up from storage; here we check directly.
    state.service.init().await?;
    state.service.check_now(true).await;
    Ok(())
}

pub async fn cmd_history(state: &AppState, limit: usize) -> anyhow::Result<()> {
    let history = state.library(None).history(limit).await?;

    if history.is_empty() {
        println!("No viewing history.");
        return Ok(());
    }

    println!("Recently Watched (last {}):", history.len());
    println!("{:-<70}", "");

    for entry in history {
        let title = entry
            .anime_title
            .unwrap_or_else(|| format!("Unknown (ID: {})", entry.anime_id));
        println!("• {} - Episode {}", title, entry.episode);
        println!(
            "  ID: {} | {}",
            entry.anime_id,
            entry.watched_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

pub async fn cmd_bookmark_add(
    state: &AppState,
    anime_id: &str,
    title: Option<String>,
) -> anyhow::Result<()> {
    state
        .library(None)
        .add_bookmark(AnimeId::new(anime_id), title)
        .await?;
    println!("✓ Bookmarked {anime_id}");
    Ok(())
}

pub async fn cmd_bookmark_remove(state: &AppState, anime_id: &str) -> anyhow::Result<()> {
    if state
        .library(None)
        .remove_bookmark(&AnimeId::new(anime_id))
        .await?
    {
        println!("✓ Removed bookmark {anime_id}");
    } else {
        println!("{anime_id} was not bookmarked.");
    }
    Ok(())
}

pub async fn cmd_bookmark_list(state: &AppState) -> anyhow::Result<()> {
    let bookmarks = state.library(None).bookmarks().await?;

    if bookmarks.is_empty() {
        println!("No bookmarks.");
        println!();
        println!("Add one with: shinchaku bookmark add <anime_id>");
        return Ok(());
    }

    println!("Bookmarks ({} total)", bookmarks.len());
    println!("{:-<70}", "");
    for bookmark in bookmarks {
        println!(
            "• {} (ID: {}) added {}",
            bookmark.anime_title.as_deref().unwrap_or("Untitled"),
            bookmark.anime_id,
            bookmark.added_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}
