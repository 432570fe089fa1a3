//! Suite runner: owns the site server and the page, runs groups through the harness

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hairathome_common::{PageAssertionHarness, RunReport, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::checks::build_checks;
use crate::driver::{PageDriver, Viewport};
use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightPage};
use crate::server::{ServerConfig, SiteServer};
use crate::spec::{GroupSpec, SetupStep, SuiteSpec};
use crate::visual::{VisualBaselines, VisualConfig};

/// Runner configuration, usually read from `hairathome.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Site root that relative group URLs resolve against
    pub base_url: String,

    /// Directory of YAML suites
    pub specs_dir: PathBuf,

    /// Where result JSON and failure screenshots go
    pub output_dir: PathBuf,

    /// Pass threshold for groups and suites that do not set one
    pub threshold: f64,

    /// Capture the page when a group fails
    pub screenshot_on_failure: bool,

    pub browser: PlaywrightConfig,
    pub server: ServerConfig,
    pub visual: VisualConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1313/hairathome/".to_string(),
            specs_dir: PathBuf::from("checks"),
            output_dir: PathBuf::from("test-results"),
            threshold: DEFAULT_THRESHOLD,
            screenshot_on_failure: true,
            browser: PlaywrightConfig::default(),
            server: ServerConfig::default(),
            visual: VisualConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// How a group ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// The harness ran every check
    Completed { report: RunReport },
    /// Navigation or a setup step failed before any check ran
    Aborted { step: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupResult {
    pub name: String,
    pub url: Option<String>,
    pub viewport: Option<Viewport>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: GroupOutcome,
    pub failure_screenshot: Option<PathBuf>,
}

impl GroupResult {
    pub fn passed(&self) -> bool {
        match &self.outcome {
            GroupOutcome::Completed { report } => report.overall_passed(),
            GroupOutcome::Aborted { .. } => false,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match &self.outcome {
            GroupOutcome::Completed { report } => Some(report),
            GroupOutcome::Aborted { .. } => None,
        }
    }
}

/// Result of running one suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub run_id: Uuid,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub passed: bool,
    pub groups: Vec<GroupResult>,
}

impl SuiteResult {
    pub fn passed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.passed()).count()
    }

    /// Plain-text rendering: a heading per group followed by its report
    pub fn format(&self) -> String {
        let mut out = vec![format!(
            "== {} ({}/{} groups passed, {} ms) ==",
            self.suite,
            self.passed_groups(),
            self.groups.len(),
            self.duration_ms
        )];
        for group in &self.groups {
            let mut heading = format!("-- {}", group.name);
            if let Some(url) = &group.url {
                heading.push_str(&format!(" [{}]", url));
            }
            if let Some(v) = &group.viewport {
                heading.push_str(&format!(" @ {}x{}", v.width, v.height));
            }
            out.push(heading);
            match &group.outcome {
                GroupOutcome::Completed { report } => out.push(report.format()),
                GroupOutcome::Aborted { step, error } => {
                    out.push(format!("aborted at {}: {}", step, error))
                }
            }
        }
        out.join("\n")
    }
}

/// Orchestrates the server, the browser page and the harness
pub struct SuiteRunner {
    config: RunnerConfig,
    server: Option<SiteServer>,
    visual: Arc<VisualBaselines>,
}

impl SuiteRunner {
    pub fn with_config(config: RunnerConfig) -> E2eResult<Self> {
        let visual = Arc::new(VisualBaselines::new(config.visual.clone())?);
        Ok(Self {
            config,
            server: None,
            visual,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Base URL in effect: the managed server's, else the configured one
    pub fn base_url(&self) -> &str {
        self.server
            .as_ref()
            .map(|s| s.base_url())
            .unwrap_or(&self.config.base_url)
    }

    /// Start (or attach to) the site server when enabled
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if !self.config.server.enabled || self.server.is_some() {
            return Ok(());
        }
        self.server = Some(SiteServer::start(&self.config.server).await?);
        Ok(())
    }

    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Load and validate every suite in the specs directory
    pub fn load_suites(&self) -> E2eResult<Vec<SuiteSpec>> {
        let suites = SuiteSpec::load_all(&self.config.specs_dir)?;
        for suite in &suites {
            suite.validate()?;
        }
        Ok(suites)
    }

    pub async fn run_all(&mut self) -> E2eResult<Vec<SuiteResult>> {
        let suites = self.load_suites()?;
        self.run_suites(&suites).await
    }

    /// Suites in the specs directory carrying `tag`
    pub fn tagged_suites(&self, tag: &str) -> E2eResult<Vec<SuiteSpec>> {
        let suites = self.load_suites()?;
        let tagged: Vec<SuiteSpec> = SuiteSpec::filter_by_tag(&suites, tag)
            .into_iter()
            .cloned()
            .collect();
        if tagged.is_empty() {
            return Err(E2eError::SuiteNotFound(format!("no suite tagged '{}'", tag)));
        }
        Ok(tagged)
    }

    pub fn named_suite(&self, name: &str) -> E2eResult<SuiteSpec> {
        self.load_suites()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SuiteNotFound(name.to_string()))
    }

    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<Vec<SuiteResult>> {
        let suites = self.tagged_suites(tag)?;
        self.run_suites(&suites).await
    }

    pub async fn run_named(&mut self, name: &str) -> E2eResult<SuiteResult> {
        let suite = self.named_suite(name)?;
        let mut results = self.run_suites(std::slice::from_ref(&suite)).await?;
        results
            .pop()
            .ok_or_else(|| E2eError::SuiteNotFound(name.to_string()))
    }

    /// Run suites, each on a fresh browser page
    pub async fn run_suites(&mut self, suites: &[SuiteSpec]) -> E2eResult<Vec<SuiteResult>> {
        self.start_server().await?;
        info!("Running {} suite(s) against {}", suites.len(), self.base_url());

        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            let page = Arc::new(PlaywrightPage::launch(&self.config.browser).await?);
            let result = self.run_suite(suite, page.clone()).await;
            if let Err(e) = page.close().await {
                warn!("Closing browser failed: {}", e);
            }
            let result = result?;
            self.write_results(&result)?;
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.passed).count();
        info!("Suites: {} passed, {} failed", passed, results.len() - passed);
        Ok(results)
    }

    /// Run one suite's groups in order on `page`
    pub async fn run_suite(
        &self,
        suite: &SuiteSpec,
        page: Arc<dyn PageDriver>,
    ) -> E2eResult<SuiteResult> {
        suite.validate()?;

        let started_at = Utc::now();
        let start = Instant::now();
        info!("Suite '{}': {} group(s)", suite.name, suite.groups.len());

        let mut groups = Vec::with_capacity(suite.groups.len());
        for group in &suite.groups {
            let threshold = group
                .threshold
                .or(suite.threshold)
                .unwrap_or(self.config.threshold);
            let result = self.run_group(&suite.name, group, threshold, page.clone()).await?;

            if result.passed() {
                info!("✓ {} ({} ms)", group.name, result.duration_ms);
            } else {
                error!("✗ {} ({} ms)", group.name, result.duration_ms);
            }
            groups.push(result);
        }

        let passed = groups.iter().all(GroupResult::passed);
        Ok(SuiteResult {
            run_id: Uuid::new_v4(),
            suite: suite.name.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            passed,
            groups,
        })
    }

    async fn run_group(
        &self,
        suite: &str,
        group: &GroupSpec,
        threshold: f64,
        page: Arc<dyn PageDriver>,
    ) -> E2eResult<GroupResult> {
        let start = Instant::now();
        let viewport = group.viewport.map(|v| v.resolve());

        let outcome = match self.prepare(group, viewport, page.as_ref()).await {
            Err((step, error)) => {
                warn!("Group '{}' aborted at {}: {}", group.name, step, error);
                GroupOutcome::Aborted { step, error }
            }
            Ok(()) => {
                let checks = build_checks(&group.checks, page.clone(), Some(self.visual.clone()))?;
                let harness = PageAssertionHarness::new(threshold)?;
                GroupOutcome::Completed {
                    report: harness.run(&checks).await?,
                }
            }
        };

        let mut result = GroupResult {
            name: group.name.clone(),
            url: group.url.clone(),
            viewport,
            duration_ms: 0,
            outcome,
            failure_screenshot: None,
        };

        if !result.passed() && self.config.screenshot_on_failure {
            let path = self
                .config
                .output_dir
                .join("failures")
                .join(format!("{}-{}.png", suite, group.name));
            match self.capture(page.as_ref(), &path).await {
                Ok(()) => result.failure_screenshot = Some(path),
                Err(e) => warn!("Failure screenshot for '{}' not taken: {}", group.name, e),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Navigate and run setup steps; on failure returns the step label and error
    async fn prepare(
        &self,
        group: &GroupSpec,
        viewport: Option<Viewport>,
        page: &dyn PageDriver,
    ) -> Result<(), (String, String)> {
        if let Some(viewport) = viewport {
            page.set_viewport(viewport)
                .await
                .map_err(|e| ("set_viewport".to_string(), e.to_string()))?;
        }

        if let Some(url) = &group.url {
            let target = resolve_url(self.base_url(), url);
            debug!("Group '{}' -> {}", group.name, target);
            page.goto(&target, group.wait_until)
                .await
                .map_err(|e| (format!("navigate:{}", url), e.to_string()))?;
        }

        if group.settle_ms > 0 {
            page.sleep(group.settle_ms)
                .await
                .map_err(|e| (format!("settle:{}", group.settle_ms), e.to_string()))?;
        }

        for step in &group.setup {
            self.run_step(step, page)
                .await
                .map_err(|e| (step.label(), e.to_string()))?;
        }

        Ok(())
    }

    async fn run_step(&self, step: &SetupStep, page: &dyn PageDriver) -> E2eResult<()> {
        debug!("Setup step {}", step.label());
        match step {
            SetupStep::Navigate { url, wait_until } => {
                page.goto(&resolve_url(self.base_url(), url), *wait_until)
                    .await?
            }
            SetupStep::SetViewport { viewport } => page.set_viewport(viewport.resolve()).await?,
            SetupStep::Click {
                selector,
                timeout_ms,
            } => page.click(selector, *timeout_ms).await?,
            SetupStep::Wait {
                selector,
                state,
                timeout_ms,
            } => page.wait_for_selector(selector, *state, *timeout_ms).await?,
            SetupStep::Sleep { ms } => page.sleep(*ms).await?,
            SetupStep::Reload { wait_until } => page.reload(*wait_until).await?,
            SetupStep::Evaluate { script } => {
                page.evaluate(script).await?;
            }
            SetupStep::Screenshot { name, full_page } => {
                let path = self.config.output_dir.join("screenshots").join(format!("{}.png", name));
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                page.screenshot(&path, *full_page).await?
            }
        }
        Ok(())
    }

    async fn capture(&self, page: &dyn PageDriver, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        page.screenshot(path, true).await?;
        Ok(())
    }

    /// Write `<output_dir>/<suite>-results.json`
    pub fn write_results(&self, result: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self
            .config
            .output_dir
            .join(format!("{}-results.json", result.suite));
        std::fs::write(&path, serde_json::to_string_pretty(result)?)?;
        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for SuiteRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Resolve a group or step URL against the site root
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("http://localhost:1313/hairathome/", "/", "http://localhost:1313/hairathome/" ; "root")]
    #[test_case("http://localhost:1313/hairathome/", "/services/", "http://localhost:1313/hairathome/services/" ; "absolute path")]
    #[test_case("http://localhost:1313/hairathome", "booking/", "http://localhost:1313/hairathome/booking/" ; "base without slash")]
    #[test_case("http://localhost:1313/hairathome/", "https://example.com/", "https://example.com/" ; "full url")]
    fn test_resolve_url(base: &str, url: &str, expected: &str) {
        assert_eq!(resolve_url(base, url), expected);
    }

    #[test]
    fn test_config_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hairathome.toml");

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded.threshold, DEFAULT_THRESHOLD);
        assert_eq!(loaded.base_url, "http://localhost:1313/hairathome/");

        let mut config = RunnerConfig::default();
        config.threshold = 0.8;
        config.server.enabled = true;
        config.save(&path).unwrap();

        let reloaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(reloaded.threshold, 0.8);
        assert!(reloaded.server.enabled);
    }

    #[test]
    fn test_partial_config() {
        let config: RunnerConfig = toml::from_str(
            r#"
base_url = "http://127.0.0.1:8080/"

[browser]
browser = "webkit"

[visual]
update_baselines = true
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080/");
        assert_eq!(config.browser.browser, crate::playwright::Browser::Webkit);
        assert!(config.visual.update_baselines);
        assert_eq!(config.specs_dir, PathBuf::from("checks"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hairathome.toml");
        std::fs::write(&path, "threshold = \"high\"").unwrap();
        assert!(matches!(RunnerConfig::load(&path), Err(E2eError::Config(_))));
    }
}
