use crate::domain::UserId;
use crate::services::session::save_session;
use crate::state::AppState;

pub async fn cmd_login(state: &AppState, user_id: &str) -> anyhow::Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        anyhow::bail!("User ID cannot be empty");
    }

    let user = UserId::new(user_id);
    save_session(state.storage.as_ref(), Some(&user))?;
    state.service.switch_session(Some(user)).await?;

    println!("✓ Signed in as {user_id}");
    println!("  Notifications now sync with the remote store.");
    Ok(())
}

pub async fn cmd_logout(state: &AppState) -> anyhow::Result<()> {
    let Some(user) = state.service.current_user().await else {
        println!("Not signed in.");
        return Ok(());
    };

    save_session(state.storage.as_ref(), None)?;
    state.service.switch_session(None).await?;
    println!("✓ Signed out {user}. Showing local notifications.");
    Ok(())
}

pub async fn cmd_whoami(state: &AppState) -> anyhow::Result<()> {
    match state.service.current_user().await {
        Some(user) => println!("Signed in as {user}"),
        None => println!("Anonymous (local storage)"),
    }
    Ok(())
}
