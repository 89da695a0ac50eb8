use crate::boundary::BoundaryWarning;
use crate::config::ProjectSpec;
use crate::domain::{CommitRecord, Environment, STABILITY_ORDER};
use crate::error::SyncError;
use crate::git::{CommitRange, Repository};
use crate::resolver::{resolve, ResolvedReference};
use crate::status::{EnvironmentReport, StatusSource};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Commits one environment carries on top of its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDivergence {
    /// Nearest more-stable environment with a resolved commit.
    pub baseline: Environment,
    /// Newest first.
    pub commits: Vec<CommitRecord>,
    /// Baseline is not an ancestor of this environment, so `commits` is a lower bound.
    pub diverged: bool,
}

/// Per-project divergence. PROD is never a key.
///
/// An environment without an entry is unknown, which is not the same as an
/// entry with no commits.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceResult {
    pub project: String,
    pub entries: BTreeMap<Environment, EnvironmentDivergence>,
    /// Non-baseline environments whose divergence could not be computed.
    pub unknown: Vec<Environment>,
}

impl DivergenceResult {
    pub fn get(&self, environment: Environment) -> Option<&EnvironmentDivergence> {
        self.entries.get(&environment)
    }

    pub fn is_unknown(&self, environment: Environment) -> bool {
        environment != Environment::Prod && !self.entries.contains_key(&environment)
    }
}

/// Nearest environment more stable than `environment` with a resolved reference.
///
/// Walks the stability order toward PROD, skipping unresolved environments.
pub fn nearest_resolved_predecessor(
    environment: Environment,
    resolved: &BTreeMap<Environment, ResolvedReference>,
) -> Option<Environment> {
    environment
        .more_stable()
        .find(|env| resolved.get(env).is_some_and(ResolvedReference::is_resolved))
}

/// Compute the commits separating each non-baseline environment from its baseline.
pub fn diff<R: Repository + ?Sized>(
    project: &ProjectSpec,
    resolved: &BTreeMap<Environment, ResolvedReference>,
    repo: &R,
) -> DivergenceResult {
    let mut entries = BTreeMap::new();
    let mut unknown = Vec::new();

    for environment in Environment::non_baseline() {
        let Some(target) = resolved.get(&environment).and_then(ResolvedReference::commit_sha) else {
            debug!(project = %project.name, env = %environment, "unresolved, skipping");
            unknown.push(environment);
            continue;
        };
        let Some(baseline) = nearest_resolved_predecessor(environment, resolved) else {
            debug!(project = %project.name, env = %environment, "no resolved baseline");
            unknown.push(environment);
            continue;
        };
        let baseline_sha = resolved.get(&baseline).and_then(ResolvedReference::commit_sha);

        let commits = match repo.commits_between(baseline_sha, Some(target)) {
            CommitRange::Known(commits) => commits,
            CommitRange::Unknown => {
                warn!(
                    project = %project.name,
                    env = %environment,
                    "commit {} not found in history",
                    target
                );
                unknown.push(environment);
                continue;
            }
        };

        let diverged = baseline_sha
            .and_then(|b| repo.is_ancestor(b, target))
            .map_or(false, |is_ancestor| !is_ancestor);
        if diverged {
            warn!(
                project = %project.name,
                env = %environment,
                baseline = %baseline,
                "histories have diverged"
            );
        }

        info!(
            project = %project.name,
            env = %environment,
            "{} commit(s) ahead of {}",
            commits.len(),
            baseline
        );
        entries.insert(
            environment,
            EnvironmentDivergence {
                baseline,
                commits,
                diverged,
            },
        );
    }

    DivergenceResult {
        project: project.name.clone(),
        entries,
        unknown,
    }
}

/// Everything learned about one project during analysis.
#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
    pub project: ProjectSpec,
    pub reports: BTreeMap<Environment, EnvironmentReport>,
    /// Every environment has a value; unconfigured ones are `Unresolved`.
    pub resolved: BTreeMap<Environment, ResolvedReference>,
    pub divergence: DivergenceResult,
    pub warnings: Vec<BoundaryWarning>,
}

impl ProjectAnalysis {
    pub fn reported_version(&self, environment: Environment) -> Option<&str> {
        self.reports
            .get(&environment)
            .and_then(|r| r.reported_version.as_deref())
    }
}

fn unresolved_reason(report: Option<&EnvironmentReport>, project: &ProjectSpec) -> String {
    match report {
        None => "no endpoint configured".to_string(),
        Some(report) => {
            if let Some(err) = &report.fetch_error {
                format!("status query failed: {}", err)
            } else if let Some(version) = &report.reported_version {
                if project.use_version_fallback {
                    format!("version '{}' matches no tag or commit", version)
                } else {
                    "no commit id reported and version fallback is disabled".to_string()
                }
            } else {
                "neither version nor commit id reported".to_string()
            }
        }
    }
}

/// Query, resolve and diff every environment of one project.
///
/// A sync failure aborts this project only; the caller records it and moves on.
pub fn analyze_project<S, R>(
    project: &ProjectSpec,
    source: &S,
    repo: &mut R,
) -> std::result::Result<ProjectAnalysis, SyncError>
where
    S: StatusSource + ?Sized,
    R: Repository + ?Sized,
{
    let reports: BTreeMap<Environment, EnvironmentReport> = project
        .environment_endpoints
        .iter()
        .map(|(env, endpoint)| (*env, source.fetch(project, *env, endpoint)))
        .collect();

    repo.ensure_up_to_date()?;

    let mut resolved = BTreeMap::new();
    let mut warnings = Vec::new();
    for environment in STABILITY_ORDER {
        let report = reports.get(&environment);
        let reference = report
            .map(|r| resolve(r, project, &*repo))
            .unwrap_or(ResolvedReference::Unresolved);
        if !reference.is_resolved() {
            warnings.push(BoundaryWarning::UnresolvedEnvironment {
                project: project.name.clone(),
                environment,
                reason: unresolved_reason(report, project),
            });
        }
        resolved.insert(environment, reference);
    }

    let divergence = diff(project, &resolved, &*repo);
    for (environment, entry) in &divergence.entries {
        if entry.diverged {
            warnings.push(BoundaryWarning::DivergedHistory {
                project: project.name.clone(),
                environment: *environment,
                baseline: entry.baseline,
            });
        }
    }

    Ok(ProjectAnalysis {
        project: project.clone(),
        reports,
        resolved,
        divergence,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn project() -> ProjectSpec {
        ProjectSpec::new("orders", "https://git.example.com/orders.git")
    }

    /// prod <- pre <- test <- dev, two commits per hop.
    fn history() -> MockRepository {
        let mut repo = MockRepository::new();
        repo.commit("p000", "initial", &[]);
        repo.commit("r001", "ABC-1: pre work", &["p000"]);
        repo.commit("r002", "ABC-2 more pre work", &["r001"]);
        repo.commit("t001", "DEF-7: test work", &["r002"]);
        repo.commit("d001", "GHI-3 dev work", &["t001"]);
        repo.commit("d002", "GHI-3 dev follow-up, also JKL-4", &["d001"]);
        repo
    }

    fn direct(sha: &str) -> ResolvedReference {
        ResolvedReference::DirectCommit(sha.to_string())
    }

    fn all_resolved() -> BTreeMap<Environment, ResolvedReference> {
        BTreeMap::from([
            (Environment::Prod, direct("p000")),
            (Environment::Pre, direct("r002")),
            (Environment::Test, direct("t001")),
            (Environment::Dev, direct("d002")),
        ])
    }

    #[test]
    fn test_predecessor_skips_unresolved() {
        let mut resolved = all_resolved();
        resolved.insert(Environment::Test, ResolvedReference::Unresolved);
        assert_eq!(
            nearest_resolved_predecessor(Environment::Dev, &resolved),
            Some(Environment::Pre)
        );
        assert_eq!(
            nearest_resolved_predecessor(Environment::Test, &resolved),
            Some(Environment::Pre)
        );
        assert_eq!(nearest_resolved_predecessor(Environment::Prod, &resolved), None);
    }

    #[test]
    fn test_adjacent_environments() {
        let result = diff(&project(), &all_resolved(), &history());
        assert!(!result.entries.contains_key(&Environment::Prod));

        let pre = result.get(Environment::Pre).unwrap();
        assert_eq!(pre.baseline, Environment::Prod);
        let shas: Vec<_> = pre.commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["r002", "r001"]);

        let dev = result.get(Environment::Dev).unwrap();
        assert_eq!(dev.baseline, Environment::Test);
        assert_eq!(dev.commits[0].ticket_ids, vec!["GHI-3", "JKL-4"]);
        assert!(result.unknown.is_empty());
    }

    #[test]
    fn test_prod_unresolved_leaves_pre_unknown() {
        let mut resolved = all_resolved();
        resolved.insert(Environment::Prod, ResolvedReference::Unresolved);
        let result = diff(&project(), &resolved, &history());

        assert!(result.is_unknown(Environment::Pre));
        assert_eq!(result.unknown, vec![Environment::Pre]);
        let test = result.get(Environment::Test).unwrap();
        assert_eq!(test.baseline, Environment::Pre);
        assert_eq!(test.commits.len(), 1);
    }

    #[test]
    fn test_unresolved_environment_has_no_entry() {
        let mut resolved = all_resolved();
        resolved.insert(Environment::Test, ResolvedReference::Unresolved);
        let result = diff(&project(), &resolved, &history());

        assert!(result.get(Environment::Test).is_none());
        let dev = result.get(Environment::Dev).unwrap();
        assert_eq!(dev.baseline, Environment::Pre);
        assert_eq!(dev.commits.len(), 3);
    }

    #[test]
    fn test_no_divergence_is_empty_not_unknown() {
        let mut resolved = all_resolved();
        resolved.insert(Environment::Dev, direct("t001"));
        let result = diff(&project(), &resolved, &history());
        let dev = result.get(Environment::Dev).unwrap();
        assert!(dev.commits.is_empty());
        assert!(!result.is_unknown(Environment::Dev));
    }

    #[test]
    fn test_commit_missing_from_history_is_unknown() {
        let mut resolved = all_resolved();
        resolved.insert(Environment::Dev, direct("ffffffff"));
        let result = diff(&project(), &resolved, &history());
        assert!(result.is_unknown(Environment::Dev));
    }

    #[test]
    fn test_diverged_history_is_flagged() {
        let mut repo = history();
        repo.commit("x001", "hotfix on prod line", &["p000"]);
        let mut resolved = all_resolved();
        resolved.insert(Environment::Prod, direct("x001"));
        let result = diff(&project(), &resolved, &repo);
        let pre = result.get(Environment::Pre).unwrap();
        assert!(pre.diverged);
        assert_eq!(pre.commits.len(), 2);
    }

    struct FixedSource(BTreeMap<Environment, EnvironmentReport>);

    impl StatusSource for FixedSource {
        fn fetch(&self, _: &ProjectSpec, environment: Environment, _: &str) -> EnvironmentReport {
            self.0
                .get(&environment)
                .cloned()
                .unwrap_or_else(|| EnvironmentReport::failed(environment, "connection refused"))
        }
    }

    #[test]
    fn test_analyze_project_marks_unconfigured_unknown() {
        let mut project = project();
        for env in [Environment::Prod, Environment::Pre, Environment::Test] {
            project
                .environment_endpoints
                .insert(env, format!("https://{}.example.com", env.as_str().to_lowercase()));
        }
        let mut repo = history();
        repo.add_tag("1.0.0", "p000");
        let source = FixedSource(BTreeMap::from([
            (
                Environment::Prod,
                EnvironmentReport::new(Environment::Prod, Some("1.0.0".into()), None),
            ),
            (
                Environment::Pre,
                EnvironmentReport::new(Environment::Pre, None, Some("r002".into())),
            ),
        ]));

        let analysis = analyze_project(&project, &source, &mut repo).unwrap();

        assert_eq!(repo.fetch_count(), 1);
        assert_eq!(analysis.resolved.len(), 4);
        assert!(matches!(
            analysis.resolved[&Environment::Prod],
            ResolvedReference::VersionFallback { .. }
        ));
        assert_eq!(analysis.resolved[&Environment::Dev], ResolvedReference::Unresolved);
        assert_eq!(analysis.divergence.get(Environment::Pre).unwrap().commits.len(), 2);
        assert!(analysis.divergence.is_unknown(Environment::Test));
        assert!(analysis.divergence.is_unknown(Environment::Dev));
        assert_eq!(analysis.warnings.len(), 2);
        assert_eq!(analysis.reported_version(Environment::Prod), Some("1.0.0"));
    }

    #[test]
    fn test_analyze_project_sync_failure() {
        let mut repo = history();
        repo.fail_sync(SyncError::Unreachable("timed out".into()));
        let source = FixedSource(BTreeMap::new());
        let err = analyze_project(&project(), &source, &mut repo).unwrap_err();
        assert_eq!(err.kind(), "Unreachable");
    }
}
