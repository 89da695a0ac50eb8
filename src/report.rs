//! Ticket reports built from divergence analyses.
//!
//! Two CSV layouts are supported: a summary with one row per (project, ticket)
//! and a detailed audit trail with one row per (project, ticket, environment,
//! commit). Statistics are derived from the same summary rows.

use crate::analyzer::ProjectAnalysis;
use crate::domain::commit::short_sha;
use crate::domain::ticket::jira_link;
use crate::domain::{Environment, SemanticVersion};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;
use tracing::info;

const SUMMARY_ENVIRONMENTS: [Environment; 3] =
    [Environment::Dev, Environment::Test, Environment::Pre];
const MESSAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CsvFormat {
    Summary,
    Detailed,
}

/// One ticket of one project across environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSummary {
    pub ticket: String,
    pub project: String,
    pub environments: BTreeSet<Environment>,
    pub first_seen_version: Option<String>,
    pub latest_version: Option<String>,
    pub first_commit_date: Option<DateTime<Utc>>,
    pub latest_commit_date: Option<DateTime<Utc>>,
}

/// One occurrence of a ticket in one commit of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDetail {
    pub ticket: String,
    pub project: String,
    pub environment: Environment,
    pub version: Option<String>,
    pub commit_id: String,
    pub commit_date: DateTime<Utc>,
    pub commit_message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketStatistics {
    pub total_tickets: usize,
    pub multi_environment_tickets: usize,
    pub single_environment_tickets: usize,
    pub tickets_by_environment: BTreeMap<Environment, usize>,
    pub tickets_by_project: BTreeMap<String, usize>,
}

/// Every ticket occurrence, sorted by project, ticket and environment.
pub fn collect_ticket_details(analyses: &[ProjectAnalysis]) -> Vec<TicketDetail> {
    let mut details = Vec::new();
    for analysis in analyses {
        let jira = analysis.project.jira_base_url.as_deref();
        for (environment, entry) in &analysis.divergence.entries {
            let version = analysis.reported_version(*environment).map(str::to_string);
            for commit in &entry.commits {
                for ticket in &commit.ticket_ids {
                    details.push(TicketDetail {
                        ticket: ticket.clone(),
                        project: analysis.project.name.clone(),
                        environment: *environment,
                        version: version.clone(),
                        commit_id: commit.sha.clone(),
                        commit_date: commit.author_date,
                        commit_message: commit.message.clone(),
                        link: jira.map(|base| jira_link(base, ticket)),
                    });
                }
            }
        }
    }
    details.sort_by(|a, b| {
        (&a.project, &a.ticket, a.environment).cmp(&(&b.project, &b.ticket, b.environment))
    });
    details
}

/// Orders versions semantically where possible, plain text otherwise.
fn version_key(version: &str) -> (Option<SemanticVersion>, &str) {
    (SemanticVersion::parse(version), version)
}

/// Aggregate ticket occurrences per (project, ticket), sorted by that key.
pub fn collect_ticket_summaries(analyses: &[ProjectAnalysis]) -> Vec<TicketSummary> {
    let mut grouped: BTreeMap<(String, String), Vec<TicketDetail>> = BTreeMap::new();
    for detail in collect_ticket_details(analyses) {
        grouped
            .entry((detail.project.clone(), detail.ticket.clone()))
            .or_default()
            .push(detail);
    }

    grouped
        .into_iter()
        .map(|((project, ticket), details)| {
            let mut versions: Vec<&str> =
                details.iter().filter_map(|d| d.version.as_deref()).collect();
            versions.sort_by(|a, b| version_key(a).cmp(&version_key(b)));
            versions.dedup();
            TicketSummary {
                environments: details.iter().map(|d| d.environment).collect(),
                first_seen_version: versions.first().map(|v| v.to_string()),
                latest_version: versions.last().map(|v| v.to_string()),
                first_commit_date: details.iter().map(|d| d.commit_date).min(),
                latest_commit_date: details.iter().map(|d| d.commit_date).max(),
                ticket,
                project,
            }
        })
        .collect()
}

pub fn ticket_statistics(analyses: &[ProjectAnalysis]) -> TicketStatistics {
    let mut stats = TicketStatistics::default();
    for summary in collect_ticket_summaries(analyses) {
        stats.total_tickets += 1;
        *stats.tickets_by_project.entry(summary.project.clone()).or_default() += 1;
        if summary.environments.len() > 1 {
            stats.multi_environment_tickets += 1;
        }
        for env in &summary.environments {
            *stats.tickets_by_environment.entry(*env).or_default() += 1;
        }
    }
    stats.single_environment_tickets = stats.total_tickets - stats.multi_environment_tickets;
    stats
}

/// Collapse whitespace and cap the length for spreadsheet readability.
pub fn clean_commit_message(message: &str) -> String {
    let cleaned = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() > MESSAGE_LIMIT {
        let truncated: String = cleaned.chars().take(MESSAGE_LIMIT - 3).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

fn day(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

pub fn write_summary<W: io::Write>(analyses: &[ProjectAnalysis], out: W) -> Result<usize> {
    let summaries = collect_ticket_summaries(analyses);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "Ticket",
        "Project",
        "DEV",
        "TEST",
        "PRE",
        "Total_Environments",
        "First_Seen_Version",
        "Latest_Version",
        "First_Commit_Date",
        "Latest_Commit_Date",
    ])?;

    for summary in &summaries {
        let mut row = vec![summary.ticket.clone(), summary.project.clone()];
        for env in SUMMARY_ENVIRONMENTS {
            let seen = if summary.environments.contains(&env) { "Yes" } else { "No" };
            row.push(seen.to_string());
        }
        row.push(summary.environments.len().to_string());
        row.push(summary.first_seen_version.clone().unwrap_or_default());
        row.push(summary.latest_version.clone().unwrap_or_default());
        row.push(day(summary.first_commit_date));
        row.push(day(summary.latest_commit_date));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(summaries.len())
}

pub fn write_detailed<W: io::Write>(analyses: &[ProjectAnalysis], out: W) -> Result<usize> {
    let details = collect_ticket_details(analyses);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "Ticket",
        "Project",
        "Environment",
        "Version",
        "Commit_ID",
        "Commit_Date",
        "Commit_Message",
        "Link",
    ])?;

    for detail in &details {
        writer.write_record([
            detail.ticket.as_str(),
            detail.project.as_str(),
            detail.environment.as_str(),
            detail.version.as_deref().unwrap_or_default(),
            short_sha(&detail.commit_id),
            &detail.commit_date.format("%Y-%m-%d").to_string(),
            &clean_commit_message(&detail.commit_message),
            detail.link.as_deref().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(details.len())
}

/// Write a CSV report to `path`. Returns the number of data rows.
pub fn write_csv_report(
    analyses: &[ProjectAnalysis],
    path: &Path,
    format: CsvFormat,
) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let rows = match format {
        CsvFormat::Summary => write_summary(analyses, file)?,
        CsvFormat::Detailed => write_detailed(analyses, file)?,
    };
    info!(path = %path.display(), rows, "CSV report written");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::divergence::{DivergenceResult, EnvironmentDivergence};
    use crate::config::ProjectSpec;
    use crate::domain::CommitRecord;
    use crate::status::EnvironmentReport;
    use chrono::TimeZone;

    fn commit(sha: &str, day: u32, message: &str) -> CommitRecord {
        let date = Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap();
        CommitRecord::new(sha, "Dana", date, message)
    }

    fn analysis() -> ProjectAnalysis {
        let mut project = ProjectSpec::new("frontend-app", "https://git.example.com/frontend.git");
        project.jira_base_url = Some("https://jira.example.com/".into());

        let entries = BTreeMap::from([
            (
                Environment::Test,
                EnvironmentDivergence {
                    baseline: Environment::Pre,
                    commits: vec![commit("1111111111", 10, "BWD-123: first pass")],
                    diverged: false,
                },
            ),
            (
                Environment::Dev,
                EnvironmentDivergence {
                    baseline: Environment::Test,
                    commits: vec![
                        commit("2222222222", 15, "BWD-123 follow-up\n\nalso   AUTH-456"),
                        commit("3333333333", 12, "chore: no ticket"),
                    ],
                    diverged: false,
                },
            ),
        ]);
        let reports = BTreeMap::from([
            (
                Environment::Dev,
                EnvironmentReport::new(Environment::Dev, Some("2.0.0".into()), None),
            ),
            (
                Environment::Test,
                EnvironmentReport::new(Environment::Test, Some("1.5.0".into()), None),
            ),
        ]);

        ProjectAnalysis {
            project,
            reports,
            resolved: BTreeMap::new(),
            divergence: DivergenceResult {
                project: "frontend-app".into(),
                entries,
                unknown: vec![Environment::Pre],
            },
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_summary_rows() {
        let mut out = Vec::new();
        let rows = write_summary(&[analysis()], &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            concat!(
                "Ticket,Project,DEV,TEST,PRE,Total_Environments,",
                "First_Seen_Version,Latest_Version,First_Commit_Date,Latest_Commit_Date"
            )
        );
        assert_eq!(lines[1], "AUTH-456,frontend-app,Yes,No,No,1,2.0.0,2.0.0,2024-01-15,2024-01-15");
        assert_eq!(lines[2], "BWD-123,frontend-app,Yes,Yes,No,2,1.5.0,2.0.0,2024-01-10,2024-01-15");
    }

    #[test]
    fn test_detailed_rows() {
        let mut out = Vec::new();
        let rows = write_detailed(&[analysis()], &mut out).unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[1],
            concat!(
                "AUTH-456,frontend-app,DEV,2.0.0,22222222,2024-01-15,",
                "BWD-123 follow-up also AUTH-456,https://jira.example.com/browse/AUTH-456"
            )
        );
        assert!(lines[2].starts_with("BWD-123,frontend-app,TEST,1.5.0,11111111,"));
        assert!(lines[3].starts_with("BWD-123,frontend-app,DEV,2.0.0,22222222,"));
    }

    #[test]
    fn test_clean_commit_message() {
        assert_eq!(clean_commit_message("fix:\n\n  trim\tthis"), "fix: trim this");
        let long = "x".repeat(150);
        let cleaned = clean_commit_message(&long);
        assert_eq!(cleaned.len(), 100);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_statistics() {
        let stats = ticket_statistics(&[analysis()]);
        assert_eq!(stats.total_tickets, 2);
        assert_eq!(stats.multi_environment_tickets, 1);
        assert_eq!(stats.single_environment_tickets, 1);
        assert_eq!(stats.tickets_by_environment[&Environment::Dev], 2);
        assert_eq!(stats.tickets_by_environment[&Environment::Test], 1);
        assert_eq!(stats.tickets_by_project["frontend-app"], 2);
    }

    #[test]
    fn test_write_csv_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let rows = write_csv_report(&[analysis()], &path, CsvFormat::Detailed).unwrap();
        assert_eq!(rows, 3);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Ticket,Project,Environment"));
    }
}
