//! One-shot episode check

use super::notifications::print_notifications;
use crate::domain::events::SkipReason;
use crate::services::CheckOutcome;
use crate::state::AppState;

pub async fn cmd_check(state: &AppState, force: bool) -> anyhow::Result<()> {
    state.service.init().await?;

    match state.service.check_now(force).await {
        CheckOutcome::Completed {
            changed,
            notifications,
        } => {
            if changed {
                println!("Notifications updated.");
            } else {
                println!("No new episodes.");
            }
            println!();
            print_notifications(&notifications);
        }
        CheckOutcome::Skipped(SkipReason::Throttled) => {
            println!("Checked less than 15 minutes ago. Use --force to check anyway.");
        }
        CheckOutcome::Skipped(reason) => {
            println!("Check skipped ({reason:?}).");
        }
        CheckOutcome::Failed => {
            anyhow::bail!("Episode check failed; see logs for details");
        }
    }

    Ok(())
}
