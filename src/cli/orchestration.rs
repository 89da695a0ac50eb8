//! Workflow orchestration for the `analyze` and `release` commands
//!
//! Both workflows walk the configured projects strictly in listing order. A
//! failure in one project is recorded in its outcome and never stops the rest;
//! the only run-level failure is a malformed release ticket.
//!
//! Nothing here touches the terminal. Confirmation is an injected function so
//! the release path is deterministic under test.

use std::fmt;

use tracing::{info, warn};

use crate::analyzer::{analyze_project, plan, ProjectAnalysis, ReleasePlan};
use crate::boundary::BoundaryWarning;
use crate::config::ProjectSpec;
use crate::domain::TicketId;
use crate::error::{PlanError, SyncError};
use crate::git::{RefKind, Repository};
use crate::status::StatusSource;

/// One configured project and its repository handle.
///
/// `repo` is an error when the mirror could not even be opened; the project is
/// then reported as failed without being touched.
pub struct ProjectTarget<R> {
    pub project: ProjectSpec,
    pub repo: Result<R, SyncError>,
}

impl<R> ProjectTarget<R> {
    pub fn new(project: ProjectSpec, repo: Result<R, SyncError>) -> Self {
        ProjectTarget { project, repo }
    }
}

fn auth_warning(project: &ProjectSpec, error: &SyncError) -> Option<BoundaryWarning> {
    matches!(error, SyncError::AuthFailure(_)).then(|| BoundaryWarning::FetchAuthenticationFailed {
        project: project.name.clone(),
        remote: project.repository_url.clone(),
    })
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

/// A project that could not be analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFailure {
    pub project: String,
    pub error: SyncError,
}

/// Result of an `analyze` run, in project listing order.
#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub analyses: Vec<ProjectAnalysis>,
    pub failures: Vec<AnalysisFailure>,
    pub warnings: Vec<BoundaryWarning>,
}

impl AnalysisSummary {
    /// True when no project could be analysed at all.
    pub fn is_total_failure(&self) -> bool {
        self.analyses.is_empty() && !self.failures.is_empty()
    }
}

/// Analyse every project, optionally removing each mirror afterwards.
pub fn run_analysis<S, R>(
    targets: &mut [ProjectTarget<R>],
    source: &S,
    cleanup: bool,
) -> AnalysisSummary
where
    S: StatusSource + ?Sized,
    R: Repository,
{
    let mut summary = AnalysisSummary::default();

    for target in targets.iter_mut() {
        let project = &target.project;
        info!(project = %project.name, "analyzing");

        let result = match target.repo.as_mut() {
            Ok(repo) => analyze_project(project, source, repo),
            Err(e) => Err(e.clone()),
        };

        match result {
            Ok(mut analysis) => {
                summary.warnings.append(&mut analysis.warnings);
                summary.analyses.push(analysis);
            }
            Err(error) => {
                warn!(project = %project.name, error = %error, "analysis failed");
                summary.warnings.extend(auth_warning(project, &error));
                summary.failures.push(AnalysisFailure {
                    project: project.name.clone(),
                    error,
                });
            }
        }

        if cleanup {
            if let Ok(repo) = target.repo.as_mut() {
                if let Err(e) = repo.cleanup() {
                    warn!(project = %project.name, error = %e, "mirror cleanup failed");
                }
            }
        }
    }

    summary
}

// ---------------------------------------------------------------------------
// release
// ---------------------------------------------------------------------------

/// Options for the release workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseOptions {
    /// Plan only; no branch, tag or push.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoChanges,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoChanges => f.write_str("no changes since last tag"),
        }
    }
}

/// Final state of one project in a release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Branch and tag were created locally; each push was confirmed or declined independently.
    Released { branch_pushed: bool, tag_pushed: bool },
    /// Dry run.
    Planned,
    Skipped(SkipReason),
    Failed { kind: String, message: String },
}

impl ReleaseStatus {
    fn failed(kind: &str, message: impl fmt::Display) -> Self {
        ReleaseStatus::Failed {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseStatus::Released { .. } => f.write_str("released"),
            ReleaseStatus::Planned => f.write_str("planned"),
            ReleaseStatus::Skipped(reason) => write!(f, "skipped: {}", reason),
            ReleaseStatus::Failed { kind, .. } => write!(f, "failed: error: {}", kind),
        }
    }
}

/// Outcome of one project in a release run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOutcome {
    pub project: String,
    /// Absent when planning itself failed.
    pub plan: Option<ReleasePlan>,
    pub status: ReleaseStatus,
    pub warnings: Vec<BoundaryWarning>,
}

impl ProjectOutcome {
    fn new(project: &ProjectSpec, plan: Option<ReleasePlan>, status: ReleaseStatus) -> Self {
        ProjectOutcome {
            project: project.name.clone(),
            plan,
            status,
            warnings: Vec::new(),
        }
    }
}

/// Aggregate of a release run, in project listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSummary {
    pub ticket: TicketId,
    pub outcomes: Vec<ProjectOutcome>,
}

impl ReleaseSummary {
    pub fn released(&self) -> usize {
        self.count(|s| matches!(s, ReleaseStatus::Released { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ReleaseStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ReleaseStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&ReleaseStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Cut a release for `ticket` across every project.
///
/// Per project: plan, skip when nothing changed, otherwise reset the release
/// branch to the main head, push it if confirmed, tag the branch and push the
/// tag if confirmed. The two confirmations are independent.
pub fn execute_release<R, F>(
    ticket: &str,
    targets: &mut [ProjectTarget<R>],
    options: ReleaseOptions,
    mut confirm: F,
) -> Result<ReleaseSummary, PlanError>
where
    R: Repository,
    F: FnMut(&str) -> bool,
{
    let ticket_id = TicketId::parse(ticket)?;
    let mut outcomes = Vec::with_capacity(targets.len());

    for target in targets.iter_mut() {
        let project = &target.project;
        let outcome = match target.repo.as_mut() {
            Ok(repo) => release_project(project, ticket_id.as_str(), repo, options, &mut confirm),
            Err(error) => {
                let status = ReleaseStatus::failed(error.kind(), &*error);
                let mut outcome = ProjectOutcome::new(project, None, status);
                outcome.warnings.extend(auth_warning(project, error));
                outcome
            }
        };
        info!(project = %outcome.project, status = %outcome.status, "release processed");
        outcomes.push(outcome);
    }

    Ok(ReleaseSummary {
        ticket: ticket_id,
        outcomes,
    })
}

fn release_project<R, F>(
    project: &ProjectSpec,
    ticket: &str,
    repo: &mut R,
    options: ReleaseOptions,
    confirm: &mut F,
) -> ProjectOutcome
where
    R: Repository + ?Sized,
    F: FnMut(&str) -> bool,
{
    let plan = match plan(project, ticket, repo) {
        Ok(plan) => plan,
        Err(error) => {
            warn!(project = %project.name, error = %error, "planning failed");
            let mut outcome =
                ProjectOutcome::new(project, None, ReleaseStatus::failed(error.kind(), &error));
            if let PlanError::Sync(sync) = &error {
                outcome.warnings.extend(auth_warning(project, sync));
            }
            return outcome;
        }
    };

    if !plan.has_changes {
        let warning = BoundaryWarning::NoChangesSinceTag {
            project: project.name.clone(),
            latest_tag: plan
                .baseline_version
                .map_or_else(|| "(none)".to_string(), |v| v.to_string()),
            current_commit_hash: plan.main_head.clone(),
        };
        let mut outcome =
            ProjectOutcome::new(project, Some(plan), ReleaseStatus::Skipped(SkipReason::NoChanges));
        outcome.warnings.push(warning);
        return outcome;
    }

    if options.dry_run {
        return ProjectOutcome::new(project, Some(plan), ReleaseStatus::Planned);
    }

    let status = apply_plan(project, &plan, repo, confirm);
    ProjectOutcome::new(project, Some(plan), status)
}

fn apply_plan<R, F>(
    project: &ProjectSpec,
    plan: &ReleasePlan,
    repo: &mut R,
    confirm: &mut F,
) -> ReleaseStatus
where
    R: Repository + ?Sized,
    F: FnMut(&str) -> bool,
{
    if let Err(e) = repo.create_or_reset_branch(&plan.branch_name, &plan.main_head) {
        return ReleaseStatus::failed(e.kind(), e);
    }

    let mut branch_pushed = false;
    if confirm(&format!("[{}] Push branch {} to origin?", project.name, plan.branch_name)) {
        if let Err(e) = repo.push(&plan.branch_name, RefKind::Branch) {
            return ReleaseStatus::failed(e.kind(), e);
        }
        branch_pushed = true;
    }

    let tag = plan.tag_name();
    if let Err(e) = repo.create_annotated_tag(&tag, &plan.branch_name, &plan.tag_message()) {
        return ReleaseStatus::failed(e.kind(), e);
    }

    let mut tag_pushed = false;
    if confirm(&format!("[{}] Push tag {} to origin?", project.name, tag)) {
        if let Err(e) = repo.push(&tag, RefKind::Tag) {
            return ReleaseStatus::failed(e.kind(), e);
        }
        tag_pushed = true;
    }

    ReleaseStatus::Released {
        branch_pushed,
        tag_pushed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn repo_with_changes() -> MockRepository {
        let mut repo = MockRepository::new();
        repo.commit("c1", "initial", &[]);
        repo.commit("c2", "ABC-1 work", &["c1"]);
        repo.add_tag("1.0.0", "c1");
        repo.set_remote_branch("main", "c2");
        repo
    }

    fn target(name: &str, repo: MockRepository) -> ProjectTarget<MockRepository> {
        ProjectTarget::new(
            ProjectSpec::new(name, format!("https://git.example.com/{}.git", name)),
            Ok(repo),
        )
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ReleaseStatus::Planned.to_string(), "planned");
        assert_eq!(
            ReleaseStatus::Skipped(SkipReason::NoChanges).to_string(),
            "skipped: no changes since last tag"
        );
        assert_eq!(
            ReleaseStatus::failed("Rejected", "nope").to_string(),
            "failed: error: Rejected"
        );
    }

    #[test]
    fn test_release_creates_branch_and_tag_at_main_head() {
        let mut targets = vec![target("orders", repo_with_changes())];
        let summary =
            execute_release("X-1", &mut targets, ReleaseOptions::default(), |_| true).unwrap();

        assert_eq!(summary.released(), 1);
        let repo = targets[0].repo.as_ref().unwrap();
        assert_eq!(repo.local_branch("release/X-1"), Some("c2"));
        assert_eq!(repo.tag_target("2.0.0"), Some("c2"));
        assert_eq!(repo.tag_message("2.0.0"), Some("Release 2.0.0 for X-1"));
        assert_eq!(
            repo.pushed(),
            &[
                ("release/X-1".to_string(), RefKind::Branch),
                ("2.0.0".to_string(), RefKind::Tag)
            ]
        );
    }

    #[test]
    fn test_confirmations_are_independent() {
        let mut targets = vec![target("orders", repo_with_changes())];
        let summary = execute_release("X-1", &mut targets, ReleaseOptions::default(), |prompt| {
            prompt.contains("tag")
        })
        .unwrap();

        assert_eq!(
            summary.outcomes[0].status,
            ReleaseStatus::Released {
                branch_pushed: false,
                tag_pushed: true
            }
        );
        let repo = targets[0].repo.as_ref().unwrap();
        assert_eq!(repo.pushed(), &[("2.0.0".to_string(), RefKind::Tag)]);
    }

    #[test]
    fn test_dry_run_mutates_nothing() {
        let mut targets = vec![target("orders", repo_with_changes())];
        let options = ReleaseOptions { dry_run: true };
        let summary =
            execute_release("X-1", &mut targets, options, |_| panic!("no prompts")).unwrap();

        assert_eq!(summary.outcomes[0].status, ReleaseStatus::Planned);
        let repo = targets[0].repo.as_ref().unwrap();
        assert_eq!(repo.local_branch("release/X-1"), None);
        assert_eq!(repo.tag_target("2.0.0"), None);
    }

    #[test]
    fn test_invalid_ticket_is_fatal() {
        let mut targets = vec![target("orders", repo_with_changes())];
        let err =
            execute_release("x-1", &mut targets, ReleaseOptions::default(), |_| true).unwrap_err();
        assert_eq!(err.kind(), "InvalidTicketFormat");
        assert_eq!(targets[0].repo.as_ref().unwrap().fetch_count(), 0);
    }

    #[test]
    fn test_failures_do_not_stop_other_projects() {
        let mut rejected = repo_with_changes();
        rejected.reject_push("release/X-1");
        let mut unchanged = repo_with_changes();
        unchanged.set_remote_branch("main", "c1");

        let mut targets = vec![
            target("billing", rejected),
            ProjectTarget::new(
                ProjectSpec::new("ledger", "git@git.example.com:ledger.git"),
                Err(SyncError::AuthFailure("publickey".into())),
            ),
            target("catalog", unchanged),
            target("orders", repo_with_changes()),
        ];
        let summary =
            execute_release("X-1", &mut targets, ReleaseOptions::default(), |_| true).unwrap();

        let statuses: Vec<String> = summary.outcomes.iter().map(|o| o.status.to_string()).collect();
        assert_eq!(
            statuses,
            vec![
                "failed: error: Rejected",
                "failed: error: AuthFailure",
                "skipped: no changes since last tag",
                "released",
            ]
        );
        assert!(matches!(
            summary.outcomes[1].warnings[0],
            BoundaryWarning::FetchAuthenticationFailed { .. }
        ));
        assert!(matches!(
            summary.outcomes[2].warnings[0],
            BoundaryWarning::NoChangesSinceTag { .. }
        ));
        assert_eq!((summary.released(), summary.skipped(), summary.failed()), (1, 1, 2));
    }

    #[test]
    fn test_existing_branch_releases_next_minor() {
        let mut repo = repo_with_changes();
        repo.add_tag("2.0.0", "c1");
        repo.set_remote_branch("release/X-1", "c1");
        let mut targets = vec![target("orders", repo)];
        let summary =
            execute_release("X-1", &mut targets, ReleaseOptions::default(), |_| true).unwrap();
        assert_eq!(summary.outcomes[0].plan.as_ref().unwrap().tag_name(), "2.1.0");
        assert_eq!(summary.released(), 1);
    }
}
