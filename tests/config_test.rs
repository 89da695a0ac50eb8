// tests/config_test.rs
use release_tracker::config::{load_config, Config};
use release_tracker::domain::Environment;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{Builder, NamedTempFile};

fn yaml_file(content: &str) -> NamedTempFile {
    let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_default_values() {
    let config = Config::default();
    assert_eq!(config.workdir, PathBuf::from("repos"));
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.git_timeout_secs, 300);
    assert!(config.projects.is_empty());
}

#[test]
fn test_load_from_file() {
    let temp_file = yaml_file(
        r#"
workdir: /var/tmp/mirrors
git_timeout_secs: 60
projects:
  - name: frontend-app
    repoUrl: https://git.example.com/frontend.git
    main_branch: develop
    jira_base_url: https://jira.example.com
    env:
      PROD: https://app.example.com
      PRE: https://pre.app.example.com
      TEST: https://test.app.example.com
      DEV: https://dev.app.example.com
  - name: backend-api
    repo_url: git@git.example.com:backend.git
    verify_ssl: false
    use_version_fallback: false
"#,
    );

    let config = load_config(Some(temp_file.path().to_str().unwrap())).unwrap();
    assert_eq!(config.workdir, PathBuf::from("/var/tmp/mirrors"));
    assert_eq!(config.git_timeout().as_secs(), 60);
    assert_eq!(config.projects.len(), 2);

    let frontend = config.project("frontend-app").unwrap();
    assert_eq!(frontend.main_branch, "develop");
    assert_eq!(frontend.environment_endpoints.len(), 4);
    assert_eq!(
        frontend.environment_endpoints[&Environment::Dev],
        "https://dev.app.example.com"
    );
    assert_eq!(frontend.jira_base_url.as_deref(), Some("https://jira.example.com"));

    let backend = config.project("backend-api").unwrap();
    assert_eq!(backend.repository_url, "git@git.example.com:backend.git");
    assert!(!backend.verify_ssl);
    assert!(!backend.use_version_fallback);
    assert!(backend.environment_endpoints.is_empty());
}

#[test]
fn test_missing_file_is_config_error() {
    let err = load_config(Some("/definitely/not/here/config.yaml")).unwrap_err();
    assert_eq!(err.kind(), "Config");
}

#[test]
fn test_empty_repo_url_rejected() {
    let temp_file = yaml_file(
        r#"
projects:
  - name: orders
    repoUrl: ""
"#,
    );
    let err = load_config(Some(temp_file.path().to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("empty repoUrl"));
}

#[test]
fn test_project_name_cannot_escape_workdir() {
    for name in ["../victim", "nested/orders", "/srv/git/orders", ".."] {
        let temp_file = yaml_file(&format!(
            "projects:\n  - name: \"{}\"\n    repoUrl: https://git.example.com/x.git\n",
            name
        ));
        let err = load_config(Some(temp_file.path().to_str().unwrap())).unwrap_err();
        assert_eq!(err.kind(), "Config", "{} should be rejected", name);
    }
}

#[test]
#[serial]
fn test_config_yaml_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "projects:\n  - name: local\n    repoUrl: /srv/git/local.git\n",
    )
    .unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = load_config(None);
    std::env::set_current_dir(original).unwrap();

    let config = result.unwrap();
    assert_eq!(config.projects[0].name, "local");
}
