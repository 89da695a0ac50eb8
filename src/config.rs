use crate::domain::Environment;
use crate::error::{ReleaseTrackerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Represents the complete configuration for release-tracker.
///
/// Holds the project list plus the settings shared by every project in a run.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Root directory for per-project repository mirrors.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,

    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
}

/// Immutable per-project configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProjectSpec {
    pub name: String,

    #[serde(rename = "repoUrl", alias = "repo_url")]
    pub repository_url: String,

    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Status endpoint base URL per environment.
    #[serde(rename = "env", default)]
    pub environment_endpoints: BTreeMap<Environment, String>,

    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    #[serde(default = "default_true")]
    pub use_version_fallback: bool,

    #[serde(default)]
    pub jira_base_url: Option<String>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("repos")
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_git_timeout_secs() -> u64 {
    300
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workdir: default_workdir(),
            http_timeout_secs: default_http_timeout_secs(),
            git_timeout_secs: default_git_timeout_secs(),
            projects: Vec::new(),
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn project(&self, name: &str) -> Option<&ProjectSpec> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Reject configurations the engine cannot key on.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(ReleaseTrackerError::config("project with empty name"));
            }
            if !is_mirror_name(&project.name) {
                return Err(ReleaseTrackerError::config(format!(
                    "project name '{}' must be a plain directory name",
                    project.name
                )));
            }
            if project.repository_url.trim().is_empty() {
                return Err(ReleaseTrackerError::config(format!(
                    "project '{}' has an empty repoUrl",
                    project.name
                )));
            }
            if !seen.insert(project.name.as_str()) {
                return Err(ReleaseTrackerError::config(format!(
                    "duplicate project name '{}'",
                    project.name
                )));
            }
        }
        Ok(())
    }
}

/// Project names double as mirror directories under `workdir`, so a name
/// must be exactly one plain path component.
pub fn is_mirror_name(name: &str) -> bool {
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl ProjectSpec {
    /// Minimal spec with defaults, mostly for tests and programmatic use.
    pub fn new(name: impl Into<String>, repository_url: impl Into<String>) -> Self {
        ProjectSpec {
            name: name.into(),
            repository_url: repository_url.into(),
            main_branch: default_main_branch(),
            environment_endpoints: BTreeMap::new(),
            verify_ssl: true,
            use_version_fallback: true,
            jira_base_url: None,
        }
    }
}

/// Parses configuration text; `.toml` paths use TOML, everything else YAML.
pub fn parse_config(content: &str, path: &Path) -> Result<Config> {
    let config: Config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    config.validate()?;
    Ok(config)
}

/// Loads configuration from file.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `config.yaml` in current directory
/// 3. `release-tracker/config.yaml` in the user config directory
///
/// # Returns
/// * `Ok(Config)` - Loaded and validated configuration
/// * `Err` - If no file is found, or it cannot be read, parsed or validated
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => PathBuf::from(path),
        None => locate_config().ok_or_else(|| {
            ReleaseTrackerError::config(
                "no configuration found (tried ./config.yaml and the user config directory)",
            )
        })?,
    };

    if !path.exists() {
        return Err(ReleaseTrackerError::config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    tracing::info!(
        path = %path.display(),
        projects = config.projects.len(),
        "loaded configuration"
    );
    Ok(config)
}

fn locate_config() -> Option<PathBuf> {
    let local = PathBuf::from("./config.yaml");
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("release-tracker").join("config.yaml");
    user.exists().then_some(user)
}
