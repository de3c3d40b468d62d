//! Live status command.

use std::fmt::Write as _;

use sourcemgr_core::{FleetManager, PollResult, PollSummary, StatusTier};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Status command handler. Fails with a connection error when any polled
/// server is offline.
pub async fn cmd_status(
    fleet: &FleetManager,
    name: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let summary = if name.eq_ignore_ascii_case("all") {
        fleet.refresh_all().await?
    } else {
        let id = fleet.find(name).await?.id();
        PollSummary::from_results(vec![fleet.refresh(id).await?])
    };

    match format {
        OutputFormat::Table => println!("{}", format_summary(&summary)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary)
                .map_err(|e| CliError::Config(format!("Failed to serialize status: {e}")))?
        ),
    }

    if summary.offline > 0 {
        return Err(CliError::Partial {
            failed: summary.offline,
            total: summary.total,
        });
    }
    Ok(())
}

/// One status line: marker, name, then players and map or the reason
#[must_use]
pub fn format_result(result: &PollResult, name_width: usize) -> String {
    let (marker, detail) = match result.tier() {
        StatusTier::Online => ("✓", result.status.player_map_info()),
        StatusTier::Degraded => (
            "~",
            format!(
                "reachable, no query reply ({})",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        ),
        StatusTier::Offline => (
            "✗",
            format!("offline ({})", result.error.as_deref().unwrap_or("unreachable")),
        ),
    };
    format!("{marker} {:<name_width$}  {detail}", result.name)
}

/// Formats a poll round with a closing count line
#[must_use]
pub fn format_summary(summary: &PollSummary) -> String {
    if summary.results.is_empty() {
        return "No servers configured.".to_string();
    }
    let width = summary
        .results
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for result in &summary.results {
        let _ = writeln!(out, "{}", format_result(result, width));
    }
    let _ = write!(
        out,
        "\n{} servers: {} online, {} degraded, {} offline",
        summary.total, summary.online, summary.degraded, summary.offline
    );
    out
}
