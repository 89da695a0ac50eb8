use thiserror::Error;

/// Failure to bring a project's local mirror in sync with its remote.
///
/// Aborts processing for that one project only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("repository corrupt: {0}")]
    Corrupt(String),
}

impl SyncError {
    /// Classify a libgit2 error raised while talking to a remote or opening a mirror.
    pub fn from_git2(err: &git2::Error) -> Self {
        let msg = err.message().to_string();
        match (err.code(), err.class()) {
            (git2::ErrorCode::Auth, _) => SyncError::AuthFailure(msg),
            (git2::ErrorCode::User, _) => {
                SyncError::Unreachable(format!("transfer aborted: {}", msg))
            }
            (git2::ErrorCode::Certificate, _) => SyncError::Unreachable(msg),
            (_, git2::ErrorClass::Net)
            | (_, git2::ErrorClass::Http)
            | (_, git2::ErrorClass::Ssl)
            | (_, git2::ErrorClass::Os) => SyncError::Unreachable(msg),
            (_, git2::ErrorClass::Ssh) if msg.to_lowercase().contains("auth") => {
                SyncError::AuthFailure(msg)
            }
            (_, git2::ErrorClass::Ssh) => SyncError::Unreachable(msg),
            _ => SyncError::Corrupt(msg),
        }
    }

    /// Short name of the failure kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Unreachable(_) => "Unreachable",
            SyncError::AuthFailure(_) => "AuthFailure",
            SyncError::Corrupt(_) => "Corrupt",
        }
    }
}

/// Failure to compute a release plan for a project.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid ticket format '{0}': expected LETTERS-DIGITS (e.g. BWD-123)")]
    InvalidTicketFormat(String),

    #[error("main branch '{0}' not found locally or on origin")]
    NoMainBranch(String),

    #[error("commit history between {from} and {to} is unavailable")]
    HistoryUnavailable { from: String, to: String },

    #[error("no version follows tag {0}: component overflow")]
    VersionOverflow(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("git error: {0}")]
    Git(String),
}

impl PlanError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::InvalidTicketFormat(_) => "InvalidTicketFormat",
            PlanError::NoMainBranch(_) => "NoMainBranch",
            PlanError::HistoryUnavailable { .. } => "HistoryUnavailable",
            PlanError::VersionOverflow(_) => "VersionOverflow",
            PlanError::Sync(e) => e.kind(),
            PlanError::Git(_) => "Git",
        }
    }
}

/// Failure to publish a single ref to the remote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("push of '{refname}' rejected: {reason}")]
    Rejected { refname: String, reason: String },

    #[error("network failure during push: {0}")]
    NetworkFailure(String),
}

impl PushError {
    pub fn kind(&self) -> &'static str {
        match self {
            PushError::Rejected { .. } => "Rejected",
            PushError::NetworkFailure(_) => "NetworkFailure",
        }
    }
}

/// Unified error type for release-tracker operations
#[derive(Error, Debug)]
pub enum ReleaseTrackerError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Branch error: {0}")]
    Branch(String),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Status query failed: {0}")]
    Status(#[from] reqwest::Error),

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in release-tracker
pub type Result<T> = std::result::Result<T, ReleaseTrackerError>;

impl ReleaseTrackerError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseTrackerError::Config(msg.into())
    }

    /// Create a branch error with context
    pub fn branch(msg: impl Into<String>) -> Self {
        ReleaseTrackerError::Branch(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        ReleaseTrackerError::Tag(msg.into())
    }

    /// Short name of the failure kind, used in the release summary.
    pub fn kind(&self) -> &'static str {
        match self {
            ReleaseTrackerError::Git(_) => "Git",
            ReleaseTrackerError::Config(_) => "Config",
            ReleaseTrackerError::Branch(_) => "Branch",
            ReleaseTrackerError::Tag(_) => "Tag",
            ReleaseTrackerError::Status(_) => "Status",
            ReleaseTrackerError::Report(_) => "Report",
            ReleaseTrackerError::Sync(e) => e.kind(),
            ReleaseTrackerError::Plan(e) => e.kind(),
            ReleaseTrackerError::Push(e) => e.kind(),
            ReleaseTrackerError::Yaml(_) | ReleaseTrackerError::Toml(_) => "Config",
            ReleaseTrackerError::Io(_) => "Io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseTrackerError::config("duplicate project 'orders'");
        assert_eq!(
            err.to_string(),
            "Configuration error: duplicate project 'orders'"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseTrackerError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert_eq!(err.kind(), "Io");
    }

    #[test]
    fn test_sync_error_classification() {
        let auth = git2::Error::new(
            git2::ErrorCode::Auth,
            git2::ErrorClass::Http,
            "authentication required",
        );
        assert!(matches!(SyncError::from_git2(&auth), SyncError::AuthFailure(_)));

        let net = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Net,
            "failed to resolve address",
        );
        assert!(matches!(SyncError::from_git2(&net), SyncError::Unreachable(_)));

        let odb = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Odb,
            "object not found",
        );
        assert!(matches!(SyncError::from_git2(&odb), SyncError::Corrupt(_)));

        let aborted = git2::Error::new(
            git2::ErrorCode::User,
            git2::ErrorClass::Callback,
            "transfer cancelled",
        );
        assert!(matches!(
            SyncError::from_git2(&aborted),
            SyncError::Unreachable(_)
        ));
    }

    #[test]
    fn test_nested_kinds_surface() {
        let err: ReleaseTrackerError = PlanError::Sync(SyncError::AuthFailure("x".into())).into();
        assert_eq!(err.kind(), "AuthFailure");

        let err: ReleaseTrackerError = PushError::Rejected {
            refname: "refs/heads/release/X-1".into(),
            reason: "protected branch".into(),
        }
        .into();
        assert_eq!(err.kind(), "Rejected");
        assert!(err.to_string().contains("protected branch"));
    }

    #[test]
    fn test_plan_error_messages_are_descriptive() {
        let error_pairs = vec![
            (
                PlanError::InvalidTicketFormat("bwd-1".into()),
                "invalid ticket format",
            ),
            (PlanError::NoMainBranch("main".into()), "main branch 'main'"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
