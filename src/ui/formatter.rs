//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! Report text is built by `format_*` functions so it can be tested; the
//! `display_*` wrappers only print.

use std::fmt::Write;

use console::style;

use crate::analyzer::{ProjectAnalysis, ReleasePlan};
use crate::boundary::BoundaryWarning;
use crate::cli::orchestration::{AnalysisSummary, ReleaseStatus, ReleaseSummary};
use crate::domain::ticket::jira_link;
use crate::domain::version::VersionBump;
use crate::domain::STABILITY_ORDER;
use crate::report::TicketStatistics;
use crate::resolver::ResolvedReference;

/// Commits listed per environment before eliding the rest.
const COMMIT_DISPLAY_LIMIT: usize = 20;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

fn resolution_text(reference: &ResolvedReference) -> String {
    match reference {
        ResolvedReference::DirectCommit(sha) => {
            format!("{} ({})", crate::domain::commit::short_sha(sha), reference.method_name())
        }
        ResolvedReference::VersionFallback { version, sha } => format!(
            "{} ({} from {})",
            crate::domain::commit::short_sha(sha),
            reference.method_name(),
            version
        ),
        ResolvedReference::Unresolved => "unknown".to_string(),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Render one project's analysis.
pub fn format_analysis(analysis: &ProjectAnalysis) -> String {
    let mut out = String::new();
    let project = &analysis.project;
    let _ = writeln!(out, "\n{}", style(format!("Project: {}", project.name)).bold());

    for environment in STABILITY_ORDER {
        let reference = analysis
            .resolved
            .get(&environment)
            .cloned()
            .unwrap_or(ResolvedReference::Unresolved);
        let version = analysis.reported_version(environment).unwrap_or("-");
        let _ = write!(
            out,
            "  {:<5} version {:<12} commit {}",
            environment.as_str(),
            version,
            resolution_text(&reference)
        );

        if environment == STABILITY_ORDER[0] {
            let _ = writeln!(out, "  {}", style("[baseline]").dim());
            continue;
        }

        let Some(entry) = analysis.divergence.get(environment) else {
            let _ = writeln!(out, "  {}", style("divergence unknown").yellow());
            continue;
        };
        let lower_bound = if entry.diverged { "at least " } else { "" };
        let _ = writeln!(
            out,
            "  {}{} commit(s) ahead of {}",
            lower_bound,
            entry.commits.len(),
            entry.baseline
        );

        for commit in entry.commits.iter().take(COMMIT_DISPLAY_LIMIT) {
            let _ = write!(
                out,
                "      {} {} ({})",
                style(commit.short_sha()).cyan(),
                truncate(&commit.subject_line, 72),
                commit.author_name
            );
            if let Some(base) = project.jira_base_url.as_deref() {
                for ticket in &commit.ticket_ids {
                    let _ = write!(out, " {}", style(jira_link(base, ticket)).underlined());
                }
            }
            out.push('\n');
        }
        if entry.commits.len() > COMMIT_DISPLAY_LIMIT {
            let _ = writeln!(
                out,
                "      ... and {} more commits",
                entry.commits.len() - COMMIT_DISPLAY_LIMIT
            );
        }
    }
    out
}

pub fn display_analysis(summary: &AnalysisSummary) {
    for analysis in &summary.analyses {
        print!("{}", format_analysis(analysis));
    }
    for failure in &summary.failures {
        display_error(&format!(
            "{}: error: {} ({})",
            failure.project,
            failure.error.kind(),
            failure.error
        ));
    }
}

pub fn format_statistics(stats: &TicketStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", style("Ticket statistics").bold());
    let _ = writeln!(out, "  Total tickets:          {}", stats.total_tickets);
    let _ = writeln!(out, "  In multiple envs:       {}", stats.multi_environment_tickets);
    let _ = writeln!(out, "  In a single env:        {}", stats.single_environment_tickets);
    for (environment, count) in &stats.tickets_by_environment {
        let _ = writeln!(out, "  {:<5}                   {}", environment.as_str(), count);
    }
    for (project, count) in &stats.tickets_by_project {
        let _ = writeln!(out, "  {}: {}", project, count);
    }
    out
}

pub fn display_statistics(stats: &TicketStatistics) {
    print!("{}", format_statistics(stats));
}

/// Display a planned release before anything is mutated.
pub fn display_plan(plan: &ReleasePlan) {
    let from = plan
        .baseline_version
        .map_or_else(|| "none".to_string(), |v| v.to_string());
    let bump = match plan.bump {
        VersionBump::Major => "new release branch, major bump",
        VersionBump::Minor => "existing release branch, minor bump",
    };
    println!("\n{}", style(format!("Project: {}", plan.project)).bold());
    println!("  Branch:  {}", plan.branch_name);
    println!("  From:    {}", style(from).red());
    println!("  To:      {} ({})", style(plan.next_version).green(), bump);
    println!("  Commits: {}", plan.commits_included);
}

fn status_cell(status: &ReleaseStatus) -> String {
    match status {
        ReleaseStatus::Released {
            branch_pushed,
            tag_pushed,
        } => {
            let pushed: Vec<&str> = [(*branch_pushed, "branch"), (*tag_pushed, "tag")]
                .iter()
                .filter(|(done, _)| *done)
                .map(|(_, name)| *name)
                .collect();
            if pushed.is_empty() {
                format!("{} (local only)", status)
            } else {
                format!("{} (pushed {})", status, pushed.join(", "))
            }
        }
        _ => status.to_string(),
    }
}

/// Render the per-project release table.
pub fn format_release_summary(summary: &ReleaseSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}",
        style(format!("Release summary for {}", summary.ticket)).bold()
    );
    let _ = writeln!(
        out,
        "  {:<20} {:<24} {:<10} {:>7}  {}",
        "PROJECT", "BRANCH", "VERSION", "COMMITS", "STATUS"
    );
    for outcome in &summary.outcomes {
        let (branch, version, commits) = match &outcome.plan {
            Some(plan) => (
                plan.branch_name.clone(),
                plan.next_version.to_string(),
                plan.commits_included.to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "  {:<20} {:<24} {:<10} {:>7}  {}",
            outcome.project,
            branch,
            version,
            commits,
            status_cell(&outcome.status)
        );
    }
    let _ = writeln!(
        out,
        "\n  {} released, {} skipped, {} failed",
        summary.released(),
        summary.skipped(),
        summary.failed()
    );
    out
}

pub fn display_release_summary(summary: &ReleaseSummary) {
    for outcome in &summary.outcomes {
        for warning in &outcome.warnings {
            display_boundary_warning(warning);
        }
    }
    print!("{}", format_release_summary(summary));
}
