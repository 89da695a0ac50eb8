//! Environment status source.
//!
//! Each environment exposes one JSON document describing what is deployed.
//! Only the build version and git commit id are of interest.

use crate::config::ProjectSpec;
use crate::domain::Environment;
use crate::error::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const INFO_PATH: &str = "actuator/info";

const VERSION_PATHS: &[&[&str]] = &[
    &["build", "version"],
    &["app", "version"],
    &["version"],
    &["git", "build", "version"],
];

const COMMIT_PATHS: &[&[&str]] = &[
    &["git", "commit", "id"],
    &["git", "commit", "id", "abbrev"],
    &["build", "commit"],
    &["commit"],
    &["git", "commit"],
];

/// What one environment reported about itself. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub environment: Environment,
    pub reported_version: Option<String>,
    pub reported_commit_id: Option<String>,
    pub fetch_error: Option<String>,
}

impl EnvironmentReport {
    pub fn new(
        environment: Environment,
        reported_version: Option<String>,
        reported_commit_id: Option<String>,
    ) -> Self {
        EnvironmentReport {
            environment,
            reported_version,
            reported_commit_id,
            fetch_error: None,
        }
    }

    pub fn failed(environment: Environment, error: impl Into<String>) -> Self {
        EnvironmentReport {
            environment,
            reported_version: None,
            reported_commit_id: None,
            fetch_error: Some(error.into()),
        }
    }

    /// Build a report from a status document.
    pub fn from_document(environment: Environment, document: &Value) -> Self {
        EnvironmentReport::new(
            environment,
            extract_version(document),
            extract_commit_id(document),
        )
    }
}

/// Anything that can tell what an environment runs.
///
/// Implementations never fail; problems are captured in `fetch_error`.
pub trait StatusSource {
    fn fetch(
        &self,
        project: &ProjectSpec,
        environment: Environment,
        endpoint: &str,
    ) -> EnvironmentReport;
}

/// Blocking HTTP client for `{endpoint}/actuator/info` documents.
pub struct ActuatorClient {
    timeout: Duration,
}

impl ActuatorClient {
    pub fn new(timeout: Duration) -> Self {
        ActuatorClient { timeout }
    }

    fn get_document(&self, project: &ProjectSpec, url: &str) -> Result<Value> {
        // Built per call so certificate policy stays per project.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!project.verify_ssl)
            .build()?;
        let document = client.get(url).send()?.error_for_status()?.json::<Value>()?;
        Ok(document)
    }
}

impl StatusSource for ActuatorClient {
    fn fetch(
        &self,
        project: &ProjectSpec,
        environment: Environment,
        endpoint: &str,
    ) -> EnvironmentReport {
        let url = info_url(endpoint);
        debug!(
            project = %project.name,
            env = %environment,
            url = %url,
            "querying status endpoint"
        );
        match self.get_document(project, &url) {
            Ok(document) => EnvironmentReport::from_document(environment, &document),
            Err(e) => {
                warn!(
                    project = %project.name,
                    env = %environment,
                    error = %e,
                    "status query failed"
                );
                EnvironmentReport::failed(environment, e.to_string())
            }
        }
    }
}

pub fn info_url(endpoint: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), INFO_PATH)
}

fn nested<'a>(document: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(document, |current, key| current.get(key))
}

/// Reported text as-is; blank strings count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

pub fn extract_version(document: &Value) -> Option<String> {
    VERSION_PATHS
        .iter()
        .filter_map(|path| nested(document, path))
        .find_map(scalar_text)
}

pub fn extract_commit_id(document: &Value) -> Option<String> {
    COMMIT_PATHS
        .iter()
        .filter_map(|path| nested(document, path))
        .find_map(|value| match value {
            Value::Object(map) => map
                .get("id")
                .and_then(scalar_text)
                .or_else(|| map.get("abbrev").and_then(scalar_text)),
            other => scalar_text(other),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_document() {
        let doc = json!({
            "build": { "version": "1.4.0" },
            "git": { "commit": { "id": "9f8e7d6c5b4a" } }
        });
        let report = EnvironmentReport::from_document(Environment::Pre, &doc);
        assert_eq!(report.reported_version.as_deref(), Some("1.4.0"));
        assert_eq!(report.reported_commit_id.as_deref(), Some("9f8e7d6c5b4a"));
        assert_eq!(report.fetch_error, None);
    }

    #[test]
    fn test_missing_commit_leaves_version_only() {
        let doc = json!({ "build": { "version": "2.0.0" }, "git": {} });
        assert_eq!(extract_commit_id(&doc), None);
        assert_eq!(extract_version(&doc).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_abbreviated_commit_object() {
        let doc = json!({ "git": { "commit": { "id": { "abbrev": "abc1234" } } } });
        assert_eq!(extract_commit_id(&doc).as_deref(), Some("abc1234"));
    }

    #[test]
    fn test_alternative_paths() {
        let doc = json!({ "app": { "version": 3 }, "commit": "feedface" });
        assert_eq!(extract_version(&doc).as_deref(), Some("3"));
        assert_eq!(extract_commit_id(&doc).as_deref(), Some("feedface"));
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let doc = json!({ "build": { "version": "" }, "git": { "commit": { "id": "  " } } });
        assert_eq!(extract_version(&doc), None);
        assert_eq!(extract_commit_id(&doc), None);
    }

    #[test]
    fn test_commit_id_is_passed_through_verbatim() {
        let doc = json!({ "git": { "commit": { "id": " 9f8e7d6c\n" } } });
        assert_eq!(extract_commit_id(&doc).as_deref(), Some(" 9f8e7d6c\n"));
        let report = EnvironmentReport::from_document(Environment::Dev, &doc);
        assert_eq!(report.reported_commit_id.as_deref(), Some(" 9f8e7d6c\n"));
    }

    #[test]
    fn test_info_url() {
        assert_eq!(
            info_url("https://orders.example.com/"),
            "https://orders.example.com/actuator/info"
        );
    }
}
