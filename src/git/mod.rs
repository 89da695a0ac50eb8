//! Git operations abstraction layer
//!
//! Every higher component talks to a project's repository only through the
//! [Repository] trait, so tests can swap in an in-memory implementation.
//!
//! - [repository::Git2Repository]: an on-disk bare mirror driven by `git2`
//! - [mock::MockRepository]: an in-memory commit graph for tests
//!
//! ```rust
//! # use release_tracker::git::{Repository, CommitRange};
//! # fn example<R: Repository>(repo: &R) {
//! if let CommitRange::Known(commits) = repo.commits_between(Some("1.0.0"), Some("origin/main")) {
//!     println!("{} commits since 1.0.0", commits.len());
//! }
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::domain::{CommitRecord, SemanticVersion};
use crate::error::{PushError, Result, SyncError};
use std::collections::BTreeSet;
use std::fmt;

/// Commits separating two points in history.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitRange {
    /// Newest first.
    Known(Vec<CommitRecord>),
    /// One of the endpoints was absent or could not be found.
    Unknown,
}

impl CommitRange {
    pub fn len(&self) -> Option<usize> {
        match self {
            CommitRange::Known(commits) => Some(commits.len()),
            CommitRange::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<Vec<CommitRecord>> {
        match self {
            CommitRange::Known(commits) => Some(commits),
            CommitRange::Unknown => None,
        }
    }
}

/// Kind of ref being pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

impl RefKind {
    /// Fully qualified ref name for a short name.
    pub fn qualify(&self, name: &str) -> String {
        match self {
            RefKind::Branch => format!("refs/heads/{}", name),
            RefKind::Tag => format!("refs/tags/{}", name),
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => f.write_str("branch"),
            RefKind::Tag => f.write_str("tag"),
        }
    }
}

/// A project's synchronized repository.
///
/// A handle is owned by exactly one project for the duration of a run.
/// Mutating operations take `&mut self`, so a handle is never driven by two
/// in-flight operations at once.
pub trait Repository {
    /// Clone the mirror if absent, otherwise fetch all remote branches and tags.
    ///
    /// Idempotent; call it before anything that needs fresh state.
    fn ensure_up_to_date(&mut self) -> std::result::Result<(), SyncError>;

    /// Resolve any commit-ish (full or short sha, tag, branch, `refs/...`) to a
    /// full commit sha. `None` when nothing matches.
    fn resolve_ref(&self, reference: &str) -> Option<String>;

    /// Commits reachable from `descendant` but not from `ancestor`, newest first.
    ///
    /// Returns [CommitRange::Unknown] instead of an empty list if either side is
    /// absent or cannot be found.
    fn commits_between(&self, ancestor: Option<&str>, descendant: Option<&str>) -> CommitRange;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    /// `None` when either side cannot be found.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Option<bool>;

    /// Root of the first-parent chain starting at `from`.
    fn root_commit(&self, from: &str) -> Option<String>;

    /// All tags that parse as a bare `major.minor.patch`.
    fn list_semantic_tags(&self) -> Result<BTreeSet<SemanticVersion>>;

    /// Whether a branch exists locally, or on `origin` when `remote` is set.
    fn branch_exists(&self, name: &str, remote: bool) -> bool;

    /// Tip of a local branch, or of `origin/<name>` when `remote` is set.
    fn branch_head(&self, name: &str, remote: bool) -> Option<String>;

    /// Create a local branch at `from_ref`, or reset it there if it exists.
    fn create_or_reset_branch(&mut self, name: &str, from_ref: &str) -> Result<()>;

    /// Create an annotated tag. Fails if the tag already exists.
    fn create_annotated_tag(&mut self, name: &str, at_ref: &str, message: &str) -> Result<()>;

    /// Push one branch or tag to `origin`.
    fn push(&mut self, ref_name: &str, kind: RefKind) -> std::result::Result<(), PushError>;

    /// Delete the local mirror.
    fn cleanup(&mut self) -> Result<()>;
}
