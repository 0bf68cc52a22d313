use crate::domain::AnimeId;
use crate::models::Notification;
use crate::state::AppState;

pub fn print_notifications(notifications: &[Notification]) {
    if notifications.is_empty() {
        println!("No new episodes.");
        return;
    }

    println!("New Episodes ({} anime)", notifications.len());
    println!("{:-<70}", "");

    for n in notifications {
        let total = n
            .total_episodes
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        println!("🆕 {} [{}/{}]", n.anime_title, n.new_episode, total);
        println!(
            "  ID: {} | Episode {} -> {} (+{}) | Seen: {}",
            n.anime_id,
            n.old_episode,
            n.new_episode,
            n.pending(),
            n.observed_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub async fn cmd_notifications(state: &AppState) -> anyhow::Result<()> {
    state.service.init().await?;
    print_notifications(&state.service.notifications().await);
    Ok(())
}

pub async fn cmd_dismiss(state: &AppState, anime_id: &str) -> anyhow::Result<()> {
    state.service.init().await?;
    state.service.dismiss(&AnimeId::new(anime_id)).await?;
    println!("✓ Dismissed notification for {anime_id}");
    Ok(())
}

pub async fn cmd_dismiss_all(state: &AppState) -> anyhow::Result<()> {
    state.service.init().await?;
    state.service.dismiss_all().await?;
    println!("✓ All notifications dismissed");
    Ok(())
}
