//! Offline commands of the hairathome-check binary

use std::path::Path;
use std::process::{Command, Output};

fn check(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hairathome-check"))
        .current_dir(dir)
        .env_remove("HAIRATHOME_CONFIG")
        .env("NO_COLOR", "1")
        .args(args)
        .output()
        .unwrap()
}

fn write_suite(dir: &Path, file: &str, body: &str) {
    std::fs::create_dir_all(dir.join("checks")).unwrap();
    std::fs::write(dir.join("checks").join(file), body).unwrap();
}

const HOME: &str = r#"
name: home
tags: [smoke]
groups:
  - name: landing
    url: /
    checks:
      - {name: hasTitle, kind: title}
      - {name: hasHeader, kind: element, selector: header, critical: true}
"#;

#[test]
fn validate_accepts_good_suites() {
    let dir = tempfile::tempdir().unwrap();
    write_suite(dir.path(), "home.yaml", HOME);

    let out = check(dir.path(), &["validate", "--format", "json"]);
    assert_eq!(out.status.code(), Some(0));
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rows[0]["name"], "home");
    assert_eq!(rows[0]["checks"], 2);
}

#[test]
fn validate_fails_on_invalid_suite() {
    let dir = tempfile::tempdir().unwrap();
    write_suite(dir.path(), "home.yaml", HOME);
    write_suite(
        dir.path(),
        "bad.yaml",
        "name: bad\nthreshold: 2\ngroups: [{name: g, checks: [{name: t, kind: title}]}]\n",
    );

    let out = check(dir.path(), &["validate"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("threshold 2 is outside [0, 1]"));
}

#[test]
fn missing_specs_dir_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = check(dir.path(), &["list"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("suite directory not found"));
}

#[test]
fn contrast_reports_rating_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();

    let out = check(dir.path(), &["contrast", "#ffffff", "#050505", "--format", "json"]);
    assert_eq!(out.status.code(), Some(0));
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rows[0]["rating"], "AAA");

    let out = check(dir.path(), &["contrast", "#eeeeee", "#ffffff"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();

    let out = check(dir.path(), &["config", "--init"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(dir.path().join("hairathome.toml").exists());

    let again = check(dir.path(), &["config", "--init"]);
    assert_eq!(again.status.code(), Some(2));

    let shown = check(dir.path(), &["config"]);
    let text = String::from_utf8_lossy(&shown.stdout);
    assert!(text.contains("base_url = \"http://localhost:1313/hairathome/\""));
    assert!(text.contains("[browser]"));
}
