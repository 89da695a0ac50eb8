use crate::config::ProjectSpec;
use crate::domain::{SemanticVersion, TicketId, VersionBump};
use crate::error::PlanError;
use crate::git::{CommitRange, Repository};
use tracing::{debug, info};

/// What releasing one project for a ticket would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    pub project: String,
    pub ticket_id: TicketId,
    /// `release/{ticket}`
    pub branch_name: String,
    pub branch_is_new: bool,
    /// Highest semantic tag before planning, if any.
    pub baseline_version: Option<SemanticVersion>,
    pub next_version: SemanticVersion,
    pub bump: VersionBump,
    /// Commits on main since the baseline tag (or since the root commit).
    pub commits_included: usize,
    pub has_changes: bool,
    /// Main branch tip the release branch is cut from.
    pub main_head: String,
}

impl ReleasePlan {
    /// Name of the tag the release would create.
    pub fn tag_name(&self) -> String {
        self.next_version.to_string()
    }

    pub fn tag_message(&self) -> String {
        format!("Release {} for {}", self.next_version, self.ticket_id)
    }
}

/// Compute the next version for a set of tags.
///
/// A new release branch opens a new major line. An existing one gets a minor
/// bump on the highest tag, unless there are no tags to bump at all.
pub fn next_version(
    tags: &std::collections::BTreeSet<SemanticVersion>,
    branch_is_new: bool,
) -> Result<(SemanticVersion, VersionBump), PlanError> {
    let overflow = || {
        let latest = tags.iter().next_back().map(|v| v.to_string());
        PlanError::VersionOverflow(latest.unwrap_or_default())
    };
    match tags.iter().next_back() {
        Some(latest) if !branch_is_new => latest
            .bump(VersionBump::Minor)
            .map(|v| (v, VersionBump::Minor))
            .ok_or_else(overflow),
        _ => SemanticVersion::next_major(tags)
            .map(|v| (v, VersionBump::Major))
            .ok_or_else(overflow),
    }
}

fn main_head<R: Repository + ?Sized>(project: &ProjectSpec, repo: &R) -> Result<String, PlanError> {
    repo.branch_head(&project.main_branch, true)
        .or_else(|| repo.branch_head(&project.main_branch, false))
        .ok_or_else(|| PlanError::NoMainBranch(project.main_branch.clone()))
}

/// Plan a release of `project` for `ticket`.
///
/// The ticket is validated before any git I/O. Reads history only; the
/// repository is never mutated apart from the fetch.
pub fn plan<R: Repository + ?Sized>(
    project: &ProjectSpec,
    ticket: &str,
    repo: &mut R,
) -> Result<ReleasePlan, PlanError> {
    let ticket_id = TicketId::parse(ticket)?;
    let branch_name = ticket_id.release_branch();

    repo.ensure_up_to_date()?;
    let main_head = main_head(project, &*repo)?;

    let tags = repo
        .list_semantic_tags()
        .map_err(|e| PlanError::Git(e.to_string()))?;
    let baseline_version = tags.iter().next_back().copied();

    let branch_is_new = !repo.branch_exists(&branch_name, true);
    let (next_version, bump) = next_version(&tags, branch_is_new)?;
    debug!(
        project = %project.name,
        "{} tag(s), branch {} {}",
        tags.len(),
        branch_name,
        if branch_is_new { "is new" } else { "exists" }
    );

    let last_release = match baseline_version {
        Some(version) => {
            let tag = version.to_string();
            repo.resolve_ref(&format!("refs/tags/{}", tag))
                .ok_or(PlanError::HistoryUnavailable {
                    from: tag,
                    to: main_head.clone(),
                })?
        }
        None => repo
            .root_commit(&main_head)
            .ok_or_else(|| PlanError::Git(format!("no root commit reachable from {}", main_head)))?,
    };

    let commits_included = match repo.commits_between(Some(&last_release), Some(&main_head)) {
        CommitRange::Known(commits) => commits.len(),
        CommitRange::Unknown => {
            return Err(PlanError::HistoryUnavailable {
                from: last_release,
                to: main_head,
            })
        }
    };
    let has_changes = commits_included > 0;

    info!(
        project = %project.name,
        "next version {} ({} commit(s) since {})",
        next_version,
        commits_included,
        baseline_version.map_or_else(|| "root".to_string(), |v| v.to_string())
    );

    Ok(ReleasePlan {
        project: project.name.clone(),
        ticket_id,
        branch_name,
        branch_is_new,
        baseline_version,
        next_version,
        bump,
        commits_included,
        has_changes,
        main_head,
    })
}
