//! Suite runner behaviour against a scripted page

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hairathome_common::{PageError, PageHandle};
use hairathome_e2e::driver::{Viewport, WaitState, WaitUntil};
use hairathome_e2e::visual::VisualConfig;
use hairathome_e2e::{
    E2eError, GroupOutcome, PageDriver, RunnerConfig, SuiteRunner, SuiteSpec,
};
use serde_json::{json, Value};

/// A tiny stand-in for the site: a theme toggle backed by localStorage
struct ScriptedSite {
    state: Mutex<SiteState>,
}

#[derive(Default)]
struct SiteState {
    url: String,
    theme: String,
    stored: Option<String>,
    viewport: Option<Viewport>,
    calls: Vec<String>,
}

impl ScriptedSite {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SiteState {
                theme: "dark".to_string(),
                ..SiteState::default()
            }),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl PageHandle for ScriptedSite {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        let state = self.state.lock().unwrap();
        if expression.contains("data-theme") {
            Ok(json!({"found": true, "value": state.theme}))
        } else if expression.contains("localStorage") {
            Ok(state.stored.clone().map(Value::String).unwrap_or(Value::Null))
        } else if expression == "document.title" {
            Ok(json!("Hair@Home | Luxury hair care at home"))
        } else if expression.contains("querySelectorAll(\"#theme-toggle\")") {
            Ok(json!(1))
        } else if expression.contains("innerWidth") {
            Ok(json!(state.viewport.map(|v| v.width).unwrap_or(1280)))
        } else if expression.contains("throw") {
            Err(PageError::Script("Error: boom".to_string()))
        } else {
            Ok(Value::Null)
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedSite {
    async fn goto(&self, url: &str, _wait_until: WaitUntil) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("goto {}", url));
        if url.contains("missing") {
            return Err(PageError::Driver(format!("{} returned HTTP 404", url)));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("viewport {}x{}", viewport.width, viewport.height));
        state.viewport = Some(viewport);
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout_ms: u64) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click {}", selector));
        if selector != "#theme-toggle" {
            return Err(PageError::Driver(format!("waiting for {} timed out", selector)));
        }
        state.theme = if state.theme == "dark" { "light" } else { "dark" }.to_string();
        state.stored = Some(state.theme.clone());
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _state: WaitState,
        _timeout_ms: u64,
    ) -> Result<(), PageError> {
        self.state.lock().unwrap().calls.push(format!("wait {}", selector));
        Ok(())
    }

    async fn reload(&self, _wait_until: WaitUntil) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("reload".to_string());
        state.theme = state.stored.clone().unwrap_or_else(|| "dark".to_string());
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), PageError> {
        std::fs::write(path, b"png").map_err(|e| PageError::Driver(e.to_string()))
    }

    async fn close(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn sleep(&self, ms: u64) -> Result<(), PageError> {
        self.state.lock().unwrap().calls.push(format!("sleep {}", ms));
        if ms > 10_000 {
            return Err(PageError::Closed);
        }
        Ok(())
    }
}

fn runner_in(dir: &Path) -> SuiteRunner {
    let config = RunnerConfig {
        base_url: "http://localhost:1313/hairathome/".to_string(),
        specs_dir: dir.join("checks"),
        output_dir: dir.join("results"),
        visual: VisualConfig {
            baseline_dir: dir.join("baselines"),
            actual_dir: dir.join("actual"),
            diff_dir: dir.join("diffs"),
            ..VisualConfig::default()
        },
        ..RunnerConfig::default()
    };
    SuiteRunner::with_config(config).unwrap()
}

const THEME_SUITE: &str = r#"
name: theme-toggle
groups:
  - name: initial
    url: /
    viewport: desktop
    checks:
      - name: toggleExists
        kind: element
        selector: '#theme-toggle'
        critical: true
      - name: darkByDefault
        kind: attribute
        selector: html
        attribute: data-theme
        expect: {equals: dark}
  - name: toggled
    setup:
      - action: click
        selector: '#theme-toggle'
    checks:
      - name: lightTheme
        kind: attribute
        selector: html
        attribute: data-theme
        expect: {equals: light}
      - name: storedLight
        kind: local_storage
        key: theme
        expect: {equals: light}
  - name: persisted
    setup:
      - action: reload
    checks:
      - name: stillLight
        kind: attribute
        selector: html
        attribute: data-theme
        expect: {equals: light}
"#;

#[tokio::test]
async fn theme_suite_passes_and_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let site = ScriptedSite::new();
    let suite = SuiteSpec::from_yaml(THEME_SUITE).unwrap();

    let result = runner.run_suite(&suite, site.clone()).await.unwrap();

    assert!(result.passed, "{}", result.format());
    assert_eq!(result.groups.len(), 3);
    assert_eq!(
        site.calls(),
        vec![
            "viewport 1280x720",
            "goto http://localhost:1313/hairathome/",
            "click #theme-toggle",
            "reload",
        ]
    );

    let path = runner.write_results(&result).unwrap();
    assert!(path.ends_with("theme-toggle-results.json"));
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["suite"], "theme-toggle");
    assert_eq!(written["groups"][0]["status"], "completed");
    assert_eq!(written["groups"][1]["report"]["pass_count"], 2);
}

#[tokio::test]
async fn navigation_failure_aborts_only_that_group() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let suite = SuiteSpec::from_yaml(
        r#"
name: pages
groups:
  - name: gone
    url: /missing/
    checks:
      - {name: hasTitle, kind: title}
  - name: home
    url: /
    checks:
      - {name: hasTitle, kind: title}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, ScriptedSite::new()).await.unwrap();

    assert!(!result.passed);
    match &result.groups[0].outcome {
        GroupOutcome::Aborted { step, error } => {
            assert_eq!(step, "navigate:/missing/");
            assert!(error.contains("404"));
        }
        other => panic!("expected abort, got {:?}", other),
    }
    assert!(result.groups[0].failure_screenshot.as_ref().unwrap().exists());
    assert!(result.groups[1].passed());
    assert!(result.format().contains("aborted at navigate:/missing/"));
}

#[tokio::test]
async fn failing_setup_step_is_reported_by_label() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let suite = SuiteSpec::from_yaml(
        r#"
name: menu
groups:
  - name: open-menu
    url: /
    setup:
      - {action: click, selector: '.hamburger'}
    checks:
      - {name: hasTitle, kind: title}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, ScriptedSite::new()).await.unwrap();
    match &result.groups[0].outcome {
        GroupOutcome::Aborted { step, .. } => assert_eq!(step, "click:.hamburger"),
        other => panic!("expected abort, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_settle_wait_aborts_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let site = ScriptedSite::new();
    let suite = SuiteSpec::from_yaml(
        r#"
name: slow
groups:
  - name: settles
    url: /
    settle_ms: 500
    checks:
      - {name: hasTitle, kind: title}
  - name: never-settles
    url: /
    settle_ms: 60000
    checks:
      - {name: hasTitle, kind: title}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, site.clone()).await.unwrap();

    assert!(result.groups[0].passed());
    match &result.groups[1].outcome {
        GroupOutcome::Aborted { step, error } => {
            assert_eq!(step, "settle:60000");
            assert!(error.contains("closed"));
        }
        other => panic!("expected abort, got {:?}", other),
    }
    assert!(site.calls().contains(&"sleep 500".to_string()));
}

#[tokio::test]
async fn critical_failure_fails_group_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let suite = SuiteSpec::from_yaml(
        r#"
name: critical
threshold: 0.5
groups:
  - name: home
    url: /
    checks:
      - {name: a, kind: title}
      - {name: b, kind: title}
      - {name: c, kind: title}
      - {name: lightFirst, kind: attribute, selector: html, attribute: data-theme, expect: {equals: light}, critical: true}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, ScriptedSite::new()).await.unwrap();
    let report = result.groups[0].report().unwrap();
    assert_eq!(report.pass_count(), 3);
    assert_eq!(report.threshold(), 0.5);
    assert!(!report.overall_passed());
    assert!(report.format().ends_with("FAIL (critical: lightFirst)"));
}

#[tokio::test]
async fn group_threshold_overrides_suite_and_default() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let suite = SuiteSpec::from_yaml(
        r#"
name: thresholds
threshold: 0.9
groups:
  - name: lenient
    url: /
    threshold: 0.5
    checks:
      - {name: title, kind: title}
      - {name: light, kind: attribute, selector: html, attribute: data-theme, expect: {equals: light}}
  - name: strict
    checks:
      - {name: title, kind: title}
      - {name: light, kind: attribute, selector: html, attribute: data-theme, expect: {equals: light}}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, ScriptedSite::new()).await.unwrap();
    assert!(result.groups[0].passed());
    assert!(!result.groups[1].passed());
    assert_eq!(result.groups[1].report().unwrap().threshold(), 0.9);
}

#[tokio::test]
async fn script_errors_are_isolated_to_their_check() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let suite = SuiteSpec::from_yaml(
        r#"
name: faults
groups:
  - name: mobile
    url: /
    viewport: mobile
    checks:
      - {name: boom, kind: script, expression: "(() => { throw new Error('boom') })()"}
      - {name: narrow, kind: script, expression: 'window.innerWidth', expected: 375}
"#,
    )
    .unwrap();

    let result = runner.run_suite(&suite, ScriptedSite::new()).await.unwrap();
    let report = result.groups[0].report().unwrap();
    let boom = report.get("boom").unwrap();
    assert!(!boom.passed());
    assert!(boom.outcome().error().unwrap().contains("boom"));
    assert!(report.get("narrow").unwrap().passed());
}

#[tokio::test]
async fn invalid_suite_is_rejected_before_touching_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path());
    let site = ScriptedSite::new();
    let suite = SuiteSpec::from_yaml(
        "name: dup\ngroups: [{name: g, url: /, checks: [{name: x, kind: title}, {name: x, kind: title}]}]",
    )
    .unwrap();

    let err = runner.run_suite(&suite, site.clone()).await.unwrap_err();
    assert!(matches!(err, E2eError::SpecInvalid { .. }));
    assert!(site.calls().is_empty());
}

#[tokio::test]
async fn unknown_suite_name_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("checks")).unwrap();
    std::fs::write(dir.path().join("checks/theme.yaml"), THEME_SUITE).unwrap();
    let mut runner = runner_in(dir.path());

    let err = runner.run_named("no-such-suite").await.unwrap_err();
    assert!(matches!(err, E2eError::SuiteNotFound(name) if name == "no-such-suite"));
}

const SMOKE_SUITE: &str = "name: home\ntags: [smoke]\ngroups: [{name: g, url: /, checks: [{name: t, kind: title}]}]\n";

#[test]
fn suites_are_selected_from_the_specs_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("checks")).unwrap();
    std::fs::write(dir.path().join("checks/theme.yaml"), THEME_SUITE).unwrap();
    std::fs::write(dir.path().join("checks/home.yaml"), SMOKE_SUITE).unwrap();
    let runner = runner_in(dir.path());

    let names: Vec<String> = runner.load_suites().unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["home", "theme-toggle"]);

    let smoke = runner.tagged_suites("smoke").unwrap();
    assert_eq!(smoke.len(), 1);
    assert_eq!(smoke[0].name, "home");
    assert!(matches!(
        runner.tagged_suites("booking"),
        Err(E2eError::SuiteNotFound(_))
    ));

    assert_eq!(runner.named_suite("theme-toggle").unwrap().groups.len(), 3);
}

#[test]
fn invalid_suite_in_specs_directory_blocks_selection() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("checks")).unwrap();
    std::fs::write(dir.path().join("checks/home.yaml"), SMOKE_SUITE).unwrap();
    std::fs::write(
        dir.path().join("checks/bad.yaml"),
        "name: bad\ngroups: [{name: g, checks: []}]\n",
    )
    .unwrap();
    let runner = runner_in(dir.path());

    assert!(matches!(runner.load_suites(), Err(E2eError::SpecInvalid { .. })));
    assert!(runner.named_suite("home").is_err());
}

/// Drives a real browser; needs `npm install playwright && npx playwright install chromium`
#[tokio::test]
async fn real_browser_reads_title() {
    if std::env::var("HAIRATHOME_PLAYWRIGHT").as_deref() != Ok("1") {
        eprintln!("skipping: set HAIRATHOME_PLAYWRIGHT=1 to run against a real browser");
        return;
    }

    let page = hairathome_e2e::PlaywrightPage::launch(&Default::default())
        .await
        .unwrap();
    page.goto(
        "data:text/html,<title>Hair@Home</title><html data-theme=dark></html>",
        WaitUntil::Load,
    )
    .await
    .unwrap();
    assert_eq!(page.evaluate("document.title").await.unwrap(), json!("Hair@Home"));
    page.close().await.unwrap();
}
