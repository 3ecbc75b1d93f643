//! Rendering a finished [`SyncReport`] as a table or as JSON.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use orgclone_sync::{Outcome, ReconciliationResult, SyncReport};

#[derive(Serialize)]
struct SyncReportJson {
    organization: String,
    root: String,
    started_at: String,
    finished_at: String,
    summary: SyncSummaryJson,
    repositories: Vec<RepositoryJson>,
}

#[derive(Serialize)]
struct SyncSummaryJson {
    repositories: usize,
    cloned: usize,
    updated: usize,
    up_to_date: usize,
    failed: usize,
}

#[derive(Serialize)]
struct RepositoryJson {
    name: String,
    path: Option<String>,
    status: &'static str,
    head: Option<String>,
    previous_head: Option<String>,
    error: Option<String>,
}

#[derive(Tabled)]
struct RepositoryTableRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "path")]
    path: String,
}

pub fn print_json(report: &SyncReport) -> Result<()> {
    let totals = report.totals();
    let payload = SyncReportJson {
        organization: report.organization.clone(),
        root: report.root.display().to_string(),
        started_at: report.started_at.to_rfc3339(),
        finished_at: report.finished_at.to_rfc3339(),
        summary: SyncSummaryJson {
            repositories: report.results.len(),
            cloned: totals.cloned,
            updated: totals.updated,
            up_to_date: totals.up_to_date,
            failed: totals.failed,
        },
        repositories: report.results.iter().map(repository_json).collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize sync report JSON")?
    );
    Ok(())
}

fn repository_json(result: &ReconciliationResult) -> RepositoryJson {
    let previous_head = match &result.outcome {
        Outcome::Updated { from, .. } => from.clone(),
        _ => None,
    };
    RepositoryJson {
        name: result.name.to_string(),
        path: result.target.as_ref().map(|t| t.path.display().to_string()),
        status: result.outcome.label(),
        head: result.outcome.head().map(str::to_string),
        previous_head,
        error: result.outcome.error().map(|e| e.to_string()),
    }
}

pub fn print_table(report: &SyncReport) {
    let totals = report.totals();
    println!(
        "clone-org-repos v{} | {} | {} repositories | {} failed",
        env!("CARGO_PKG_VERSION"),
        report.organization,
        report.results.len(),
        totals.failed,
    );

    if report.results.is_empty() {
        println!("No repositories found in '{}'.", report.organization);
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    println!(
        "Indicators: {} CLONED  {} UPDATED  {} UP TO DATE  {} FAILED",
        "■".green().bold(),
        "■".yellow().bold(),
        "■".bright_black().bold(),
        "■".red().bold(),
    );
    println!("{separator}");

    let rows: Vec<RepositoryTableRow> = report
        .results
        .iter()
        .map(|result| RepositoryTableRow {
            repository: result.name.to_string(),
            status: outcome_label(&result.outcome).to_string(),
            detail: outcome_detail(&result.outcome),
            path: result
                .target
                .as_ref()
                .map(|t| t.path.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{separator}");

    println!(
        "{} cloned, {} updated, {} up to date, {} failed  ({} in {})",
        totals.cloned,
        totals.updated,
        totals.up_to_date,
        totals.failed,
        report.root.display(),
        format_elapsed(report),
    );

    if totals.failed > 0 {
        println!("{}", "Failures:".red().bold());
        for result in report.failures() {
            if let Some(err) = result.outcome.error() {
                println!("  {} {}: {}", "■".red().bold(), result.name, err);
            }
        }
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Cloned { .. } => "CLONED",
        Outcome::Updated { .. } => "UPDATED",
        Outcome::UpToDate { .. } => "UP TO DATE",
        Outcome::Failed(_) => "FAILED",
    }
}

fn outcome_detail(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Cloned { head: None } => "empty repository".to_string(),
        Outcome::Cloned { head: Some(head) } | Outcome::UpToDate { head: Some(head) } => {
            short_id(head).to_string()
        }
        Outcome::UpToDate { head: None } => "no commits".to_string(),
        Outcome::Updated { from, to } => format!(
            "{} -> {}",
            from.as_deref().map(short_id).unwrap_or("(none)"),
            short_id(to)
        ),
        Outcome::Failed(err) => {
            let message = err.to_string();
            match message.char_indices().nth(60) {
                Some((idx, _)) => format!("{}...", &message[..idx]),
                None => message,
            }
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn format_elapsed(report: &SyncReport) -> String {
    let elapsed = report.finished_at - report.started_at;
    let millis = elapsed.num_milliseconds().max(0);
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", millis as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_commit_ids() {
        assert_eq!(short_id("0123456789abcdef"), "0123456");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn update_detail_shows_both_ends() {
        let outcome = Outcome::Updated {
            from: Some("aaaaaaaaaa".to_string()),
            to: "bbbbbbbbbb".to_string(),
        };
        assert_eq!(outcome_detail(&outcome), "aaaaaaa -> bbbbbbb");
    }

    #[test]
    fn empty_clone_detail() {
        let outcome = Outcome::Cloned { head: None };
        assert_eq!(outcome_detail(&outcome), "empty repository");
        assert_eq!(outcome_label(&outcome), "CLONED");
    }
}
