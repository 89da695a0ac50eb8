use crate::domain::commit::short_sha;
use crate::domain::Environment;
use std::fmt;

/// Non-fatal conditions met while analysing or releasing a project.
/// They are reported to the user but never stop the run.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// Environment could not be mapped to a commit
    UnresolvedEnvironment {
        project: String,
        environment: Environment,
        reason: String,
    },
    /// Baseline is not an ancestor of the environment; the commit list is a lower bound
    DivergedHistory {
        project: String,
        environment: Environment,
        baseline: Environment,
    },
    /// Main branch head is already tagged
    NoChangesSinceTag {
        project: String,
        latest_tag: String,
        current_commit_hash: String,
    },
    /// Fetch operation failed due to authentication issues
    FetchAuthenticationFailed { project: String, remote: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::UnresolvedEnvironment {
                project,
                environment,
                reason,
            } => write!(f, "[{}] {} is unknown: {}", project, environment, reason),
            BoundaryWarning::DivergedHistory {
                project,
                environment,
                baseline,
            } => write!(
                f,
                "[{}] {} is not a fast-forward of {}; listed commits are a lower bound",
                project, environment, baseline
            ),
            BoundaryWarning::NoChangesSinceTag {
                project,
                latest_tag,
                current_commit_hash,
            } => write!(
                f,
                "[{}] No new commits since tag '{}' (current: {})",
                project,
                latest_tag,
                short_sha(current_commit_hash)
            ),
            BoundaryWarning::FetchAuthenticationFailed { project, remote } => write!(
                f,
                "[{}] Authentication failed when fetching from '{}'",
                project, remote
            ),
        }
    }
}
