use crate::config::{is_mirror_name, ProjectSpec};
use crate::domain::version::semantic_versions;
use crate::domain::{CommitRecord, SemanticVersion};
use crate::error::{PushError, ReleaseTrackerError, Result, SyncError};
use crate::git::{CommitRange, RefKind};
use chrono::{DateTime, Utc};
use git2::build::RepoBuilder;
use git2::{
    AutotagOption, BranchType, CertificateCheckStatus, Commit, Cred, CredentialType, ErrorClass,
    ErrorCode, FetchOptions, FetchPrune, Oid, PushOptions, RemoteCallbacks,
    Repository as Git2Repo, Signature, Sort,
};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const REMOTE: &str = "origin";
const FETCH_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];
const SSH_KEY_NAMES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// A project's bare mirror under the working directory, driven by libgit2.
pub struct Git2Repository {
    project: String,
    url: String,
    mirror_path: PathBuf,
    verify_ssl: bool,
    transfer_timeout: Duration,
    repo: Option<Git2Repo>,
}

impl Git2Repository {
    /// Bind a project to its mirror at `workdir/<project name>`.
    ///
    /// An existing mirror is opened immediately; an absent one is cloned by
    /// the first [`ensure_up_to_date`](crate::git::Repository::ensure_up_to_date).
    /// Every clone, fetch and push is abandoned after `transfer_timeout`.
    pub fn open(
        project: &ProjectSpec,
        workdir: &Path,
        transfer_timeout: Duration,
    ) -> std::result::Result<Self, SyncError> {
        if !is_mirror_name(&project.name) {
            return Err(SyncError::Corrupt(format!(
                "project name '{}' cannot be used as a mirror directory",
                project.name
            )));
        }
        let mirror_path = workdir.join(&project.name);
        let repo = if mirror_path.exists() {
            Some(open_mirror(&mirror_path)?)
        } else {
            None
        };

        Ok(Git2Repository {
            project: project.name.clone(),
            url: project.repository_url.clone(),
            mirror_path,
            verify_ssl: project.verify_ssl,
            transfer_timeout,
            repo,
        })
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }

    fn require_repo(&self) -> Result<&Git2Repo> {
        self.repo.as_ref().ok_or_else(|| {
            ReleaseTrackerError::Sync(SyncError::Corrupt(format!(
                "mirror for '{}' has not been cloned yet",
                self.project
            )))
        })
    }

    fn peel_oid(&self, reference: &str) -> Option<Oid> {
        let repo = self.repo.as_ref()?;
        if reference.trim().is_empty() {
            return None;
        }
        match repo.revparse_single(reference).and_then(|o| o.peel_to_commit()) {
            Ok(commit) => Some(commit.id()),
            Err(e) => {
                debug!(project = %self.project, reference, error = %e, "reference not found");
                None
            }
        }
    }

    fn remote_access(&self) -> RemoteAccess {
        RemoteAccess {
            url: self.url.clone(),
            mirror_path: self.mirror_path.clone(),
            verify_ssl: self.verify_ssl,
            deadline: Instant::now() + self.transfer_timeout,
        }
    }

    fn walk(
        &self,
        repo: &Git2Repo,
        hide: Oid,
        push: Oid,
    ) -> std::result::Result<Vec<CommitRecord>, git2::Error> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(push)?;
        revwalk.hide(hide)?;

        revwalk
            .map(|oid| -> std::result::Result<CommitRecord, git2::Error> {
                let commit = repo.find_commit(oid?)?;
                Ok(commit_record(&commit))
            })
            .collect()
    }
}

fn open_mirror(path: &Path) -> std::result::Result<Git2Repo, SyncError> {
    Git2Repo::open(path).map_err(|e| {
        SyncError::Corrupt(format!(
            "cannot open mirror {}: {}",
            path.display(),
            e.message()
        ))
    })
}

/// Everything a worker thread needs to talk to the remote on a project's
/// behalf. The deadline is fixed when the operation starts.
#[derive(Debug, Clone)]
struct RemoteAccess {
    url: String,
    mirror_path: PathBuf,
    verify_ssl: bool,
    deadline: Instant,
}

impl RemoteAccess {
    fn timeout(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Callbacks shared by clone, fetch and push. Any callback libgit2 allows
    /// to fail aborts the transfer once the deadline has passed.
    fn callbacks<'cb>(&self) -> RemoteCallbacks<'cb> {
        let mut callbacks = RemoteCallbacks::new();
        let deadline = self.deadline;

        let key_paths: Vec<PathBuf> = dirs::home_dir()
            .map(|home| {
                SSH_KEY_NAMES
                    .iter()
                    .map(|name| home.join(".ssh").join(name))
                    .filter(|path| path.exists())
                    .collect()
            })
            .unwrap_or_default();
        let mut ssh_step = 0usize;
        let mut helper_tried = false;
        let mut default_tried = false;

        // libgit2 calls back again after each rejected credential, so every
        // source is offered at most once.
        callbacks.credentials(move |url, username_from_url, allowed_types| {
            if Instant::now() >= deadline {
                return Err(deadline_exceeded());
            }
            let user = username_from_url.unwrap_or("git");

            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username(user);
            }

            if allowed_types.contains(CredentialType::SSH_KEY) {
                while ssh_step <= key_paths.len() {
                    let step = ssh_step;
                    ssh_step += 1;
                    let cred = if step == 0 {
                        Cred::ssh_key_from_agent(user)
                    } else {
                        Cred::ssh_key(user, None, &key_paths[step - 1], None)
                    };
                    if let Ok(cred) = cred {
                        return Ok(cred);
                    }
                }
            }

            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) && !helper_tried {
                helper_tried = true;
                if let Ok(config) = git2::Config::open_default() {
                    if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }

            if allowed_types.contains(CredentialType::DEFAULT) && !default_tried {
                default_tried = true;
                return Cred::default();
            }

            Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Callback,
                format!("no usable credentials for {}", url),
            ))
        });

        let verify_ssl = self.verify_ssl;
        callbacks.certificate_check(move |_cert, _host| {
            if Instant::now() >= deadline {
                Err(deadline_exceeded())
            } else if verify_ssl {
                Ok(CertificateCheckStatus::CertificatePassthrough)
            } else {
                Ok(CertificateCheckStatus::CertificateOk)
            }
        });

        callbacks.sideband_progress(move |_message| Instant::now() < deadline);
        callbacks.transfer_progress(move |_progress| Instant::now() < deadline);
        callbacks.push_negotiation(move |_updates| {
            if Instant::now() >= deadline {
                Err(deadline_exceeded())
            } else {
                Ok(())
            }
        });

        callbacks
    }

    fn fetch_options<'cb>(&self) -> FetchOptions<'cb> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.callbacks());
        fetch_options.prune(FetchPrune::On);
        fetch_options.download_tags(AutotagOption::All);
        fetch_options
    }

    fn fetch_into(&self, repo: &Git2Repo) -> std::result::Result<(), SyncError> {
        let mut remote = repo.find_remote(REMOTE).map_err(|e| {
            SyncError::Corrupt(format!(
                "mirror has no '{}' remote: {}",
                REMOTE,
                e.message()
            ))
        })?;
        remote
            .fetch(&FETCH_REFSPECS, Some(&mut self.fetch_options()), None)
            .map_err(|e| SyncError::from_git2(&e))
    }

    fn fetch(&self) -> std::result::Result<(), SyncError> {
        let repo = open_mirror(&self.mirror_path)?;
        self.fetch_into(&repo)
    }

    fn clone_mirror(&self) -> std::result::Result<(), SyncError> {
        if let Some(parent) = self.mirror_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Corrupt(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let mut builder = RepoBuilder::new();
        builder.bare(true);
        builder.fetch_options(self.fetch_options());
        let repo = builder
            .clone(&self.url, &self.mirror_path)
            .map_err(|e| SyncError::from_git2(&e))?;

        // The clone only follows tags reachable from fetched branches.
        self.fetch_into(&repo)
    }

    fn push(&self, qualified: &str) -> std::result::Result<(), PushError> {
        let repo = open_mirror(&self.mirror_path)
            .map_err(|e| PushError::NetworkFailure(e.to_string()))?;
        let mut remote = repo
            .find_remote(REMOTE)
            .map_err(|e| PushError::NetworkFailure(e.message().to_string()))?;

        let refspec = format!("{0}:{0}", qualified);
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        let result = {
            let mut callbacks = self.callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    *rejection.borrow_mut() = Some(format!("{}: {}", refname, status));
                }
                Ok(())
            });
            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut push_options))
        };

        match (result, rejection.into_inner()) {
            (Err(e), _) => Err(push_error(&e, qualified)),
            (Ok(()), Some(reason)) => Err(PushError::Rejected {
                refname: qualified.to_string(),
                reason,
            }),
            (Ok(()), None) => Ok(()),
        }
    }
}

fn deadline_exceeded() -> git2::Error {
    git2::Error::new(
        ErrorCode::User,
        ErrorClass::Callback,
        "transfer deadline exceeded",
    )
}

fn push_error(e: &git2::Error, qualified: &str) -> PushError {
    let network = e.code() == ErrorCode::User
        || matches!(
            e.class(),
            ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssl | ErrorClass::Ssh | ErrorClass::Os
        );
    if network {
        PushError::NetworkFailure(e.message().to_string())
    } else {
        PushError::Rejected {
            refname: qualified.to_string(),
            reason: e.message().to_string(),
        }
    }
}

/// Run a remote operation on a worker thread, waiting at most `timeout`.
///
/// libgit2 has no callback while a connection is being opened or a response
/// awaited, so a stalled server is only bounded from here. A worker that
/// misses the deadline is left to finish on its own.
fn run_bounded<T, F>(project: &str, timeout: Duration, op: F) -> std::result::Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (result_tx, result_rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("remote-{}", project))
        .spawn(move || {
            let _ = result_tx.send(op());
        })
        .map_err(|e| format!("cannot start remote worker: {}", e))?;

    match result_rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            warn!(project, "remote operation still running after {:?}, giving up", timeout);
            Err(format!("no response from remote within {:.1}s", timeout.as_secs_f64()))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err("remote worker stopped unexpectedly".to_string())
        }
    }
}

fn commit_record(commit: &Commit<'_>) -> CommitRecord {
    let author = commit.author();
    let author_date =
        DateTime::<Utc>::from_timestamp(author.when().seconds(), 0).unwrap_or_default();
    CommitRecord::new(
        commit.id().to_string(),
        author.name().unwrap_or("unknown"),
        author_date,
        commit.message().unwrap_or("").trim_end(),
    )
}

impl super::Repository for Git2Repository {
    fn ensure_up_to_date(&mut self) -> std::result::Result<(), SyncError> {
        let access = self.remote_access();
        let timeout = access.timeout();

        if self.repo.is_some() {
            info!(project = %self.project, "fetching remote branches and tags");
            return run_bounded(&self.project, timeout, move || access.fetch())
                .map_err(SyncError::Unreachable)?;
        }

        info!(project = %self.project, path = %self.mirror_path.display(), "cloning mirror");
        run_bounded(&self.project, timeout, move || access.clone_mirror())
            .map_err(SyncError::Unreachable)??;
        self.repo = Some(open_mirror(&self.mirror_path)?);
        Ok(())
    }

    fn resolve_ref(&self, reference: &str) -> Option<String> {
        self.peel_oid(reference).map(|oid| oid.to_string())
    }

    fn commits_between(&self, ancestor: Option<&str>, descendant: Option<&str>) -> CommitRange {
        let (Some(repo), Some(ancestor), Some(descendant)) =
            (self.repo.as_ref(), ancestor, descendant)
        else {
            return CommitRange::Unknown;
        };
        let (Some(hide), Some(push)) = (self.peel_oid(ancestor), self.peel_oid(descendant)) else {
            return CommitRange::Unknown;
        };

        match self.walk(repo, hide, push) {
            Ok(commits) => CommitRange::Known(commits),
            Err(e) => {
                warn!(
                    project = %self.project,
                    ancestor,
                    descendant,
                    error = %e,
                    "history walk failed"
                );
                CommitRange::Unknown
            }
        }
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Option<bool> {
        let repo = self.repo.as_ref()?;
        let ancestor = self.peel_oid(ancestor)?;
        let descendant = self.peel_oid(descendant)?;
        if ancestor == descendant {
            return Some(true);
        }
        repo.graph_descendant_of(descendant, ancestor).ok()
    }

    fn root_commit(&self, from: &str) -> Option<String> {
        let repo = self.repo.as_ref()?;
        let mut commit = repo.find_commit(self.peel_oid(from)?).ok()?;
        while let Ok(parent) = commit.parent(0) {
            commit = parent;
        }
        Some(commit.id().to_string())
    }

    fn list_semantic_tags(&self) -> Result<BTreeSet<SemanticVersion>> {
        let repo = self.require_repo()?;
        let names = repo.tag_names(None)?;
        Ok(semantic_versions(names.iter().flatten()))
    }

    fn branch_exists(&self, name: &str, remote: bool) -> bool {
        self.branch_head(name, remote).is_some()
    }

    fn branch_head(&self, name: &str, remote: bool) -> Option<String> {
        let repo = self.repo.as_ref()?;
        let reference = if remote {
            repo.find_reference(&format!("refs/remotes/{}/{}", REMOTE, name))
        } else {
            repo.find_reference(&RefKind::Branch.qualify(name))
        };
        reference
            .and_then(|r| r.peel_to_commit())
            .ok()
            .map(|commit| commit.id().to_string())
    }

    fn create_or_reset_branch(&mut self, name: &str, from_ref: &str) -> Result<()> {
        let repo = self.require_repo()?;
        let target = repo.revparse_single(from_ref)?.peel_to_commit()?;

        match repo.find_branch(name, BranchType::Local) {
            Ok(branch) => {
                let mut reference = branch.into_reference();
                if let Some(current) = reference.target() {
                    if current == target.id() {
                        debug!(project = %self.project, branch = name, "branch already at target");
                        return Ok(());
                    }
                    if !repo.graph_descendant_of(target.id(), current).unwrap_or(false) {
                        warn!(
                            project = %self.project,
                            branch = name,
                            "branch has diverged from {}, resetting",
                            from_ref
                        );
                    }
                }
                let log_message = format!("release-tracker: reset to {}", from_ref);
                reference.set_target(target.id(), &log_message)?;
                info!(project = %self.project, branch = name, "reset branch to {}", from_ref);
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                repo.branch(name, &target, false)?;
                info!(project = %self.project, branch = name, "created branch from {}", from_ref);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn create_annotated_tag(&mut self, name: &str, at_ref: &str, message: &str) -> Result<()> {
        let repo = self.require_repo()?;
        if repo.find_reference(&RefKind::Tag.qualify(name)).is_ok() {
            return Err(ReleaseTrackerError::tag(format!("tag '{}' already exists", name)));
        }

        let target = repo.revparse_single(at_ref)?.peel_to_commit()?;
        let tagger = match repo.signature() {
            Ok(sig) => sig,
            Err(_) => Signature::now("release-tracker", "release-tracker@localhost")?,
        };
        repo.tag(name, target.as_object(), &tagger, message, false)?;
        info!(project = %self.project, tag = name, "created annotated tag at {}", at_ref);
        Ok(())
    }

    fn push(&mut self, ref_name: &str, kind: RefKind) -> std::result::Result<(), PushError> {
        if self.repo.is_none() {
            return Err(PushError::NetworkFailure(
                "mirror has not been cloned".to_string(),
            ));
        }

        let access = self.remote_access();
        let timeout = access.timeout();
        let qualified = kind.qualify(ref_name);
        let target = qualified.clone();
        run_bounded(&self.project, timeout, move || access.push(&target))
            .map_err(PushError::NetworkFailure)??;

        info!(project = %self.project, "pushed {} {}", kind, qualified);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.repo = None;
        if self.mirror_path.exists() {
            fs::remove_dir_all(&self.mirror_path)?;
            info!(project = %self.project, path = %self.mirror_path.display(), "removed mirror");
        }
        Ok(())
    }
}
