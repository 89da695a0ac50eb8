use crate::domain::version::semantic_versions;
use crate::domain::{CommitRecord, SemanticVersion};
use crate::error::{PushError, ReleaseTrackerError, Result, SyncError};
use crate::git::{CommitRange, RefKind, Repository};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

struct MockCommit {
    record: CommitRecord,
    parents: Vec<String>,
    /// Insertion index, used as commit time.
    seq: usize,
}

struct MockTag {
    sha: String,
    message: Option<String>,
}

/// In-memory repository for testing without actual git operations.
///
/// Commits form a real parent graph, so reachability queries behave like git.
/// Commits added later are treated as newer.
#[derive(Default)]
pub struct MockRepository {
    commits: HashMap<String, MockCommit>,
    tags: BTreeMap<String, MockTag>,
    local_branches: BTreeMap<String, String>,
    remote_branches: BTreeMap<String, String>,
    rejected_refs: HashSet<String>,
    sync_failure: Option<SyncError>,
    fetch_count: usize,
    pushed: Vec<(String, RefKind)>,
    cleaned_up: bool,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit with the given parents. Returns the sha for chaining.
    pub fn commit(&mut self, sha: &str, message: &str, parents: &[&str]) -> String {
        let seq = self.commits.len();
        let date = DateTime::<Utc>::default() + Duration::minutes(seq as i64);
        let record = CommitRecord::new(sha, "Test Author", date, message);
        self.commits.insert(
            sha.to_string(),
            MockCommit {
                record,
                parents: parents.iter().map(|p| p.to_string()).collect(),
                seq,
            },
        );
        sha.to_string()
    }

    /// Add a lightweight tag pointing to a commit
    pub fn add_tag(&mut self, name: impl Into<String>, sha: &str) {
        self.tags.insert(
            name.into(),
            MockTag {
                sha: sha.to_string(),
                message: None,
            },
        );
    }

    /// Set a branch head on `origin`
    pub fn set_remote_branch(&mut self, branch: impl Into<String>, sha: &str) {
        self.remote_branches.insert(branch.into(), sha.to_string());
    }

    /// Set a local branch head
    pub fn set_local_branch(&mut self, branch: impl Into<String>, sha: &str) {
        self.local_branches.insert(branch.into(), sha.to_string());
    }

    /// Make pushes of `ref_name` fail as if the remote refused them.
    pub fn reject_push(&mut self, ref_name: impl Into<String>) {
        self.rejected_refs.insert(ref_name.into());
    }

    /// Make every [`Repository::ensure_up_to_date`] call fail.
    pub fn fail_sync(&mut self, error: SyncError) {
        self.sync_failure = Some(error);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }

    pub fn pushed(&self) -> &[(String, RefKind)] {
        &self.pushed
    }

    pub fn local_branch(&self, name: &str) -> Option<&str> {
        self.local_branches.get(name).map(String::as_str)
    }

    pub fn tag_target(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(|t| t.sha.as_str())
    }

    pub fn tag_message(&self, name: &str) -> Option<&str> {
        self.tags.get(name).and_then(|t| t.message.as_deref())
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    fn reachable(&self, from: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(sha) = stack.pop() {
            if let Some(commit) = self.commits.get(&sha) {
                if seen.insert(sha) {
                    stack.extend(commit.parents.iter().cloned());
                }
            }
        }
        seen
    }

    fn lookup_commit(&self, candidate: &str) -> Option<String> {
        if self.commits.contains_key(candidate) {
            return Some(candidate.to_string());
        }
        if candidate.len() < 4 {
            return None;
        }
        let mut matches = self.commits.keys().filter(|sha| sha.starts_with(candidate));
        match (matches.next(), matches.next()) {
            (Some(sha), None) => Some(sha.clone()),
            _ => None,
        }
    }
}

impl Repository for MockRepository {
    fn ensure_up_to_date(&mut self) -> std::result::Result<(), SyncError> {
        self.fetch_count += 1;
        match &self.sync_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn resolve_ref(&self, reference: &str) -> Option<String> {
        if reference.is_empty() {
            return None;
        }
        if let Some(name) = reference.strip_prefix("refs/tags/") {
            return self.tags.get(name).map(|t| t.sha.clone());
        }
        if let Some(name) = reference.strip_prefix("refs/heads/") {
            return self.local_branches.get(name).cloned();
        }
        if let Some(name) = reference
            .strip_prefix("refs/remotes/origin/")
            .or_else(|| reference.strip_prefix("origin/"))
        {
            return self.remote_branches.get(name).cloned();
        }
        self.tags
            .get(reference)
            .map(|t| t.sha.clone())
            .or_else(|| self.local_branches.get(reference).cloned())
            .or_else(|| self.remote_branches.get(reference).cloned())
            .or_else(|| self.lookup_commit(reference))
    }

    fn commits_between(&self, ancestor: Option<&str>, descendant: Option<&str>) -> CommitRange {
        let (Some(ancestor), Some(descendant)) = (
            ancestor.and_then(|r| self.resolve_ref(r)),
            descendant.and_then(|r| self.resolve_ref(r)),
        ) else {
            return CommitRange::Unknown;
        };

        let hidden = self.reachable(&ancestor);
        let mut commits: Vec<&MockCommit> = self
            .reachable(&descendant)
            .iter()
            .filter(|sha| !hidden.contains(*sha))
            .filter_map(|sha| self.commits.get(sha))
            .collect();
        commits.sort_by(|a, b| b.seq.cmp(&a.seq));
        CommitRange::Known(commits.into_iter().map(|c| c.record.clone()).collect())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Option<bool> {
        let ancestor = self.resolve_ref(ancestor)?;
        let descendant = self.resolve_ref(descendant)?;
        Some(self.reachable(&descendant).contains(&ancestor))
    }

    fn root_commit(&self, from: &str) -> Option<String> {
        let mut sha = self.resolve_ref(from)?;
        while let Some(parent) = self.commits.get(&sha).and_then(|c| c.parents.first()) {
            sha = parent.clone();
        }
        Some(sha)
    }

    fn list_semantic_tags(&self) -> Result<BTreeSet<SemanticVersion>> {
        Ok(semantic_versions(self.tags.keys().map(String::as_str)))
    }

    fn branch_exists(&self, name: &str, remote: bool) -> bool {
        self.branch_head(name, remote).is_some()
    }

    fn branch_head(&self, name: &str, remote: bool) -> Option<String> {
        if remote {
            self.remote_branches.get(name).cloned()
        } else {
            self.local_branches.get(name).cloned()
        }
    }

    fn create_or_reset_branch(&mut self, name: &str, from_ref: &str) -> Result<()> {
        let sha = self
            .resolve_ref(from_ref)
            .ok_or_else(|| ReleaseTrackerError::branch(format!("cannot resolve '{}'", from_ref)))?;
        self.local_branches.insert(name.to_string(), sha);
        Ok(())
    }

    fn create_annotated_tag(&mut self, name: &str, at_ref: &str, message: &str) -> Result<()> {
        if self.tags.contains_key(name) {
            return Err(ReleaseTrackerError::tag(format!("tag '{}' already exists", name)));
        }
        let sha = self
            .resolve_ref(at_ref)
            .ok_or_else(|| ReleaseTrackerError::tag(format!("cannot resolve '{}'", at_ref)))?;
        self.tags.insert(
            name.to_string(),
            MockTag {
                sha,
                message: Some(message.to_string()),
            },
        );
        Ok(())
    }

    fn push(&mut self, ref_name: &str, kind: RefKind) -> std::result::Result<(), PushError> {
        let refname = kind.qualify(ref_name);
        if self.rejected_refs.contains(ref_name) {
            return Err(PushError::Rejected {
                refname,
                reason: "pre-receive hook declined".to_string(),
            });
        }
        match kind {
            RefKind::Branch => {
                let sha = self.local_branches.get(ref_name).cloned().ok_or_else(|| {
                    PushError::Rejected {
                        refname: refname.clone(),
                        reason: "src refspec does not match any".to_string(),
                    }
                })?;
                self.remote_branches.insert(ref_name.to_string(), sha);
            }
            RefKind::Tag => {
                if !self.tags.contains_key(ref_name) {
                    return Err(PushError::Rejected {
                        refname,
                        reason: "src refspec does not match any".to_string(),
                    });
                }
            }
        }
        self.pushed.push((ref_name.to_string(), kind));
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.cleaned_up = true;
        Ok(())
    }
}
