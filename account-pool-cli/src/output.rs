use std::io::{self, BufRead, Write};

use account_pool_core::reclaim::{AccountReport, ArtifactStatus};
use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use serde::Serialize;

pub(crate) fn note(msg: &str) {
    let _ = writeln!(io::stderr(), "account-pool: {msg}");
}

pub(crate) fn warn(msg: &str) {
    let _ = writeln!(io::stderr(), "account-pool (warning): {msg}");
}

/// Ask `prompt` on stderr and read one answer from stdin. Anything but y/yes is a no.
pub(crate) fn prompt_confirm(prompt: &str) -> bool {
    let _ = write!(io::stderr(), "{prompt} [y/N] ");
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn print_assigned(account_id: &str, owner: &str, claimed_ou: &str) {
    println!("{account_id}");
    note(&format!("assigned account {account_id} to {owner} (moved to {claimed_ou})"));
}

/// Per-account teardown summary, failures listed individually
pub(crate) fn print_reports(reports: &[AccountReport]) {
    let stderr = io::stderr();
    let mut w = stderr.lock();
    for report in reports {
        let owner = report.owner.as_deref().unwrap_or("-");
        let _ = writeln!(w, "Account {} (owner {owner})", report.account_id.bold());

        let skipped = report
            .artifacts
            .iter()
            .filter(|a| matches!(a.status, ArtifactStatus::Skipped(_)))
            .count();
        let _ = writeln!(
            w,
            "  {} deleted, {} skipped, {}",
            report.deleted_count().to_string().green(),
            skipped,
            format!("{} failed", report.failed_count()).red()
        );

        for artifact in report.failures() {
            if let ArtifactStatus::Failed(reason) = &artifact.status {
                let _ = writeln!(w, "  {} {} {}: {reason}", "x".red(), artifact.kind, artifact.name);
            }
        }
    }
}

/// Write `value` as JSON to stdout
pub(crate) fn output_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    debug!("Formatting output as JSON (pretty: {pretty})");

    let json_output = if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize output to pretty JSON")?
    } else {
        serde_json::to_string(value).context("Failed to serialize output to JSON")?
    };

    println!("{json_output}");
    Ok(())
}
