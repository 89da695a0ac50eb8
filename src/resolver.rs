//! Turns what an environment reported into a concrete commit.

use crate::config::ProjectSpec;
use crate::git::Repository;
use crate::status::EnvironmentReport;
use tracing::{debug, info, warn};

/// Outcome of resolving one environment's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// The reported commit id, verbatim and not yet checked against history.
    DirectCommit(String),
    /// Found by looking the reported version up as a tag or ref.
    VersionFallback { version: String, sha: String },
    /// Nothing usable; the environment is left out of diffing.
    Unresolved,
}

impl ResolvedReference {
    pub fn commit_sha(&self) -> Option<&str> {
        match self {
            ResolvedReference::DirectCommit(sha) => Some(sha),
            ResolvedReference::VersionFallback { sha, .. } => Some(sha),
            ResolvedReference::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ResolvedReference::Unresolved)
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            ResolvedReference::DirectCommit(_) => "commit",
            ResolvedReference::VersionFallback { .. } => "version fallback",
            ResolvedReference::Unresolved => "unresolved",
        }
    }
}

/// Ref names tried for a reported version, in order.
fn fallback_candidates(version: &str) -> [String; 3] {
    [
        format!("refs/tags/{}", version),
        format!("refs/tags/v{}", version),
        version.to_string(),
    ]
}

/// Resolve one environment report against a project's repository.
///
/// A non-empty reported commit id wins outright. Otherwise, when the project
/// allows it, the reported version is looked up as an exact tag, then as a
/// `v`-prefixed tag, then as a raw commit-ish.
pub fn resolve<R: Repository + ?Sized>(
    report: &EnvironmentReport,
    project: &ProjectSpec,
    repo: &R,
) -> ResolvedReference {
    if let Some(commit) = report
        .reported_commit_id
        .as_deref()
        .filter(|c| !c.is_empty())
    {
        return ResolvedReference::DirectCommit(commit.to_string());
    }

    let version = match report.reported_version.as_deref().filter(|v| !v.is_empty()) {
        Some(version) if project.use_version_fallback => version,
        Some(_) => {
            debug!(
                project = %project.name,
                env = %report.environment,
                "no commit id and version fallback disabled"
            );
            return ResolvedReference::Unresolved;
        }
        None => {
            if let Some(err) = &report.fetch_error {
                debug!(
                    project = %project.name,
                    env = %report.environment,
                    error = %err,
                    "environment unavailable"
                );
            }
            return ResolvedReference::Unresolved;
        }
    };

    for candidate in fallback_candidates(version) {
        if let Some(sha) = repo.resolve_ref(&candidate) {
            info!(
                project = %project.name,
                env = %report.environment,
                "resolved version '{}' via {} to {}",
                version,
                candidate,
                crate::domain::commit::short_sha(&sha)
            );
            return ResolvedReference::VersionFallback {
                version: version.to_string(),
                sha,
            };
        }
    }

    warn!(
        project = %project.name,
        env = %report.environment,
        "version '{}' could not be resolved to a commit",
        version
    );
    ResolvedReference::Unresolved
}
