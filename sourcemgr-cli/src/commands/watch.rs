//! Periodic fleet status refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use sourcemgr_core::FleetManager;

use super::status::format_summary;
use crate::error::CliError;

/// Watch command handler. Prints every refresh round until Ctrl-C or until
/// `rounds` rounds have been shown.
pub async fn cmd_watch(
    fleet: &Arc<FleetManager>,
    interval: Option<u64>,
    rounds: Option<usize>,
) -> Result<(), CliError> {
    let interval = match interval {
        Some(0) => return Err(CliError::Input("--interval must be at least 1".into())),
        Some(secs) => Duration::from_secs(secs),
        None => fleet.settings().polling.interval(),
    };
    if rounds == Some(0) {
        return Ok(());
    }

    let mut summaries = fleet.start_auto_refresh(interval).await;
    let mut shown = 0;
    loop {
        tokio::select! {
            summary = summaries.recv() => {
                let Some(summary) = summary else { break };
                println!("[{}]", Local::now().format("%H:%M:%S"));
                println!("{}\n", format_summary(&summary));
                shown += 1;
                if rounds.is_some_and(|limit| shown >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    fleet.stop_auto_refresh().await;
    Ok(())
}
