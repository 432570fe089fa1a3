//! Declarative YAML check suites

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hairathome_common::Rgba;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::driver::{Viewport, WaitState, WaitUntil};
use crate::error::{E2eError, E2eResult};

/// A suite of check groups parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Default pass threshold for every group (fraction of checks)
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Groups run in order against one page; each is one harness run
    pub groups: Vec<GroupSpec>,

    /// File this suite was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Checks that run together against one page state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,

    /// Page to load before the group, relative to the base URL.
    /// When absent the page is left where the previous group put it.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub wait_until: WaitUntil,

    /// Viewport to apply before the group; absent keeps the current one
    #[serde(default)]
    pub viewport: Option<ViewportSpec>,

    /// Pause after navigation so late scripts and styles can apply
    #[serde(default)]
    pub settle_ms: u64,

    #[serde(default)]
    pub threshold: Option<f64>,

    /// Caller actions performed after navigation, before any check runs
    #[serde(default)]
    pub setup: Vec<SetupStep>,

    pub checks: Vec<CheckSpec>,
}

/// A viewport given by preset name or explicit size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewportSpec {
    Preset(ViewportPreset),
    Size(Viewport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportPreset {
    Mobile,
    Tablet,
    Desktop,
}

impl ViewportSpec {
    pub fn resolve(&self) -> Viewport {
        match self {
            ViewportSpec::Preset(ViewportPreset::Mobile) => Viewport::MOBILE,
            ViewportSpec::Preset(ViewportPreset::Tablet) => Viewport::TABLET,
            ViewportSpec::Preset(ViewportPreset::Desktop) => Viewport::DESKTOP,
            ViewportSpec::Size(size) => *size,
        }
    }
}

/// An action the runner performs on the page before a group's checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SetupStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_until: WaitUntil,
    },

    SetViewport {
        viewport: ViewportSpec,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default = "default_action_timeout")]
        timeout_ms: u64,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default)]
        state: WaitState,
        #[serde(default = "default_action_timeout")]
        timeout_ms: u64,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    Reload {
        #[serde(default)]
        wait_until: WaitUntil,
    },

    /// Run a script for its side effects, e.g. clearing localStorage
    Evaluate {
        script: String,
    },

    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },
}

impl SetupStep {
    /// Short label used in logs and abort reasons
    pub fn label(&self) -> String {
        match self {
            SetupStep::Navigate { url, .. } => format!("navigate:{}", url),
            SetupStep::SetViewport { viewport } => {
                let v = viewport.resolve();
                format!("set_viewport:{}x{}", v.width, v.height)
            }
            SetupStep::Click { selector, .. } => format!("click:{}", selector),
            SetupStep::Wait { selector, .. } => format!("wait:{}", selector),
            SetupStep::Sleep { ms } => format!("sleep:{}ms", ms),
            SetupStep::Reload { .. } => "reload".to_string(),
            SetupStep::Evaluate { script } => {
                format!("evaluate:{}", script.chars().take(30).collect::<String>())
            }
            SetupStep::Screenshot { name, .. } => format!("screenshot:{}", name),
        }
    }
}

fn default_action_timeout() -> u64 {
    5000
}

/// One named check in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,

    /// A failing critical check fails the group regardless of score
    #[serde(default)]
    pub critical: bool,

    /// Upper bound on this check's evaluation; none by default
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(flatten)]
    pub kind: CheckKind,
}

/// What a check reads from the page and how it judges it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// `document.title`; defaults to requiring a non-empty title
    Title {
        #[serde(default)]
        expect: TextExpectation,
    },

    /// Number of elements matching a selector
    Element {
        selector: String,
        #[serde(default = "default_min")]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },

    /// Whether the first match is rendered with a non-zero box
    Visible {
        selector: String,
        #[serde(default = "default_true")]
        expected: bool,
    },

    /// A custom property on `:root`
    CssVariable {
        variable: String,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        tolerance: u8,
        #[serde(default)]
        expect: TextExpectation,
    },

    /// A computed property of the first match
    ComputedStyle {
        selector: String,
        property: String,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        tolerance: u8,
        #[serde(default)]
        expect: TextExpectation,
    },

    /// How many elements use a colour in any of `properties`
    ColorUsage {
        color: String,
        #[serde(default = "default_color_properties")]
        properties: Vec<String>,
        #[serde(default)]
        tolerance: u8,
        #[serde(default = "default_min")]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },

    Attribute {
        selector: String,
        attribute: String,
        #[serde(default)]
        expect: TextExpectation,
    },

    /// Trimmed `textContent` of the first match
    Text {
        selector: String,
        #[serde(default)]
        expect: TextExpectation,
    },

    LocalStorage {
        key: String,
        /// Require the key to be missing
        #[serde(default)]
        absent: bool,
        #[serde(default)]
        expect: TextExpectation,
    },

    /// A stylesheet link whose href contains the given text
    Stylesheet {
        href_contains: String,
    },

    /// WCAG contrast between an element's text and its effective background
    Contrast {
        selector: String,
        #[serde(default)]
        background_selector: Option<String>,
        #[serde(default = "default_min_ratio")]
        min_ratio: f64,
    },

    /// Arbitrary expression; passes when it equals `expected`, or is truthy
    Script {
        expression: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Screenshot compared against a stored baseline
    ScreenshotMatches {
        /// Baseline name; defaults to the check name
        #[serde(default)]
        baseline: Option<String>,
        #[serde(default)]
        full_page: bool,
        #[serde(default)]
        max_diff_percent: Option<f64>,
    },
}

fn default_min() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_min_ratio() -> f64 {
    4.5
}

fn default_color_properties() -> Vec<String> {
    vec![
        "color".to_string(),
        "background-color".to_string(),
        "border-color".to_string(),
    ]
}

/// Expectations on a text value; every field that is set must hold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<String>,
    /// Regular expression the value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(default)]
    pub non_empty: bool,
}

impl TextExpectation {
    pub fn is_unset(&self) -> bool {
        *self == TextExpectation::default()
    }
}

impl SuiteSpec {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec: Self = serde_yaml::from_str(&content).map_err(|e| E2eError::SpecParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// YAML files under a directory, sorted by file name
    pub fn discover(dir: &Path) -> E2eResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(E2eError::Config(format!(
                "suite directory not found: {}",
                dir.display()
            )));
        }

        Ok(walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect())
    }

    /// Load every suite under a directory, sorted by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        Self::discover(dir)?
            .iter()
            .map(|path| Self::from_file(path))
            .collect()
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Total number of checks across all groups
    pub fn check_count(&self) -> usize {
        self.groups.iter().map(|g| g.checks.len()).sum()
    }

    /// Reject suites the harness or check builder would refuse
    pub fn validate(&self) -> E2eResult<()> {
        let invalid = |reason: String| E2eError::SpecInvalid {
            suite: self.name.clone(),
            reason,
        };

        if self.groups.is_empty() {
            return Err(invalid("suite has no groups".to_string()));
        }
        if let Some(t) = self.threshold {
            check_threshold(t).map_err(&invalid)?;
        }

        let mut group_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(invalid(format!("duplicate group name '{}'", group.name)));
            }
            group
                .validate()
                .map_err(|reason| invalid(format!("group '{}': {}", group.name, reason)))?;
        }

        Ok(())
    }
}

impl GroupSpec {
    fn validate(&self) -> Result<(), String> {
        if self.checks.is_empty() {
            return Err("no checks".to_string());
        }
        if let Some(t) = self.threshold {
            check_threshold(t)?;
        }

        let mut names = HashSet::new();
        for check in &self.checks {
            if !names.insert(check.name.as_str()) {
                return Err(format!("duplicate check name '{}'", check.name));
            }
            check
                .kind
                .validate()
                .map_err(|reason| format!("check '{}': {}", check.name, reason))?;
        }

        Ok(())
    }
}

impl CheckKind {
    fn validate(&self) -> Result<(), String> {
        match self {
            CheckKind::Title { expect }
            | CheckKind::Attribute { expect, .. }
            | CheckKind::Text { expect, .. }
            | CheckKind::LocalStorage { expect, .. } => validate_expectation(expect),
            CheckKind::CssVariable { color, expect, .. }
            | CheckKind::ComputedStyle { color, expect, .. } => {
                if let Some(color) = color {
                    validate_color(color)?;
                }
                validate_expectation(expect)
            }
            CheckKind::Element { min, max, .. } | CheckKind::ColorUsage { min, max, .. } => {
                if let CheckKind::ColorUsage { color, properties, .. } = self {
                    validate_color(color)?;
                    if properties.is_empty() {
                        return Err("no properties to inspect".to_string());
                    }
                }
                match max {
                    Some(max) if max < min => Err(format!("max {} is below min {}", max, min)),
                    _ => Ok(()),
                }
            }
            CheckKind::Contrast { min_ratio, .. } => {
                if (1.0..=21.0).contains(min_ratio) {
                    Ok(())
                } else {
                    Err(format!("min_ratio {} is outside [1, 21]", min_ratio))
                }
            }
            CheckKind::ScreenshotMatches {
                max_diff_percent: Some(pct),
                ..
            } if !(0.0..=100.0).contains(pct) => {
                Err(format!("max_diff_percent {} is outside [0, 100]", pct))
            }
            CheckKind::Visible { .. }
            | CheckKind::Stylesheet { .. }
            | CheckKind::Script { .. }
            | CheckKind::ScreenshotMatches { .. } => Ok(()),
        }
    }
}

fn check_threshold(threshold: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(format!("threshold {} is outside [0, 1]", threshold))
    }
}

fn validate_color(color: &str) -> Result<(), String> {
    color.parse::<Rgba>().map(|_| ()).map_err(|e| e.to_string())
}

fn validate_expectation(expect: &TextExpectation) -> Result<(), String> {
    if let Some(pattern) = &expect.matches {
        Regex::new(pattern).map_err(|e| format!("invalid regex: {}", e))?;
    }
    Ok(())
}
