//! Turning suite check definitions into harness checks
//!
//! Every check reads the page through one `evaluate` call (screenshot checks
//! take a screenshot instead) and judges the returned value in Rust.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hairathome_common::{
    contrast_ratio, find_colors, Check, CheckFault, CheckOutcome, Evaluate, Rgba, WcagRating,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::driver::PageDriver;
use crate::error::{E2eError, E2eResult};
use crate::spec::{CheckKind, CheckSpec, TextExpectation};
use crate::visual::VisualBaselines;

/// Build harness checks for one group, in order
pub fn build_checks(
    specs: &[CheckSpec],
    page: Arc<dyn PageDriver>,
    visual: Option<Arc<VisualBaselines>>,
) -> E2eResult<Vec<Check>> {
    specs
        .iter()
        .map(|spec| {
            let probe = Probe::compile(spec)?;
            let check = PageCheck {
                script: expression(&spec.kind),
                probe,
                page: page.clone(),
                visual: visual.clone(),
                timeout: spec.timeout_ms.map(Duration::from_millis),
            };
            Ok(Check::new(spec.name.clone(), check).with_critical(spec.critical))
        })
        .collect()
}

struct PageCheck {
    script: Option<String>,
    probe: Probe,
    page: Arc<dyn PageDriver>,
    visual: Option<Arc<VisualBaselines>>,
    timeout: Option<Duration>,
}

#[async_trait]
impl Evaluate for PageCheck {
    async fn evaluate(&self) -> Result<CheckOutcome, CheckFault> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.observe())
                .await
                .map_err(|_| CheckFault::new(format!("timed out after {} ms", limit.as_millis())))?,
            None => self.observe().await,
        }
    }
}

impl PageCheck {
    async fn observe(&self) -> Result<CheckOutcome, CheckFault> {
        if let Probe::Screenshot {
            name,
            full_page,
            max_diff_percent,
        } = &self.probe
        {
            return self.screenshot(name, *full_page, *max_diff_percent).await;
        }

        let value = match &self.script {
            Some(script) => self.page.evaluate(script).await?,
            None => Value::Null,
        };
        self.probe.judge(value)
    }

    async fn screenshot(
        &self,
        name: &str,
        full_page: bool,
        max_diff_percent: Option<f64>,
    ) -> Result<CheckOutcome, CheckFault> {
        let visual = self
            .visual
            .as_ref()
            .ok_or_else(|| CheckFault::new("visual baselines are not configured"))?;

        self.page
            .screenshot(&visual.actual_path(name), full_page)
            .await?;

        match visual.compare(name, max_diff_percent) {
            Ok(diff) if diff.baseline_written => Ok(CheckOutcome::pass("baseline written")),
            Ok(diff) if diff.matches => Ok(CheckOutcome::pass(format!(
                "{:.2}% of pixels differ",
                diff.diff_percent
            ))),
            Ok(diff) => Ok(CheckOutcome::fail(format!(
                "{:.2}% of pixels differ (allowed {:.2}%)",
                diff.diff_percent,
                max_diff_percent.unwrap_or(visual.config().max_diff_percent)
            ))),
            Err(E2eError::BaselineNotFound(path)) => {
                Ok(CheckOutcome::fail(format!("no baseline at {}", path)))
            }
            Err(e) => Err(CheckFault::new(e.to_string())),
        }
    }
}

/// A text expectation with its regex compiled
#[derive(Debug)]
struct TextMatcher {
    expect: TextExpectation,
    pattern: Option<Regex>,
}

impl TextMatcher {
    /// `require_value` turns an empty expectation into `non_empty`
    fn compile(expect: &TextExpectation, require_value: bool) -> E2eResult<Self> {
        let mut expect = expect.clone();
        if require_value && expect.is_unset() {
            expect.non_empty = true;
        }
        let pattern = expect
            .matches
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| E2eError::Config(format!("invalid regex: {}", e)))?;
        Ok(Self { expect, pattern })
    }

    fn outcome(&self, actual: &str) -> CheckOutcome {
        let e = &self.expect;
        if let Some(expected) = &e.equals {
            if actual != expected {
                return CheckOutcome::fail(format!("expected '{}', got '{}'", expected, actual));
            }
        }
        if let Some(unwanted) = &e.not_equals {
            if actual == unwanted {
                return CheckOutcome::fail(format!("expected anything but '{}'", unwanted));
            }
        }
        if let Some(needle) = &e.contains {
            if !actual.contains(needle.as_str()) {
                return CheckOutcome::fail(format!(
                    "expected to contain '{}', got '{}'",
                    needle, actual
                ));
            }
        }
        if let Some(needle) = &e.not_contains {
            if actual.contains(needle.as_str()) {
                return CheckOutcome::fail(format!(
                    "expected not to contain '{}', got '{}'",
                    needle, actual
                ));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(actual) {
                return CheckOutcome::fail(format!(
                    "expected to match /{}/, got '{}'",
                    pattern, actual
                ));
            }
        }
        if e.non_empty && actual.trim().is_empty() {
            return CheckOutcome::fail("expected a non-empty value, got ''");
        }
        CheckOutcome::pass(format!("'{}'", actual))
    }
}

/// Either a colour comparison or a text expectation
#[derive(Debug)]
enum ValueMatcher {
    Color {
        source: String,
        color: Rgba,
        tolerance: u8,
    },
    Text(TextMatcher),
}

impl ValueMatcher {
    fn compile(color: &Option<String>, tolerance: u8, expect: &TextExpectation) -> E2eResult<Self> {
        match color {
            Some(source) => Ok(ValueMatcher::Color {
                source: source.clone(),
                color: parse_color(source)?,
                tolerance,
            }),
            None => Ok(ValueMatcher::Text(TextMatcher::compile(expect, true)?)),
        }
    }

    fn outcome(&self, actual: &str) -> CheckOutcome {
        match self {
            ValueMatcher::Text(matcher) => matcher.outcome(actual),
            ValueMatcher::Color {
                source,
                color,
                tolerance,
            } => match actual.trim().parse::<Rgba>() {
                Ok(found) if found.matches(color, *tolerance) => {
                    CheckOutcome::pass(format!("'{}' matches {}", actual.trim(), source))
                }
                _ => CheckOutcome::fail(format!("expected '{}', got '{}'", source, actual.trim())),
            },
        }
    }
}

#[derive(Debug)]
enum Probe {
    Title(TextMatcher),
    Element {
        selector: String,
        min: usize,
        max: Option<usize>,
    },
    Visible {
        selector: String,
        expected: bool,
    },
    CssVariable(ValueMatcher),
    ComputedStyle {
        selector: String,
        expect: ValueMatcher,
    },
    ColorUsage {
        source: String,
        color: Rgba,
        tolerance: u8,
        min: usize,
        max: Option<usize>,
    },
    Attribute {
        selector: String,
        expect: TextMatcher,
    },
    Text {
        selector: String,
        expect: TextMatcher,
    },
    LocalStorage {
        key: String,
        absent: bool,
        expect: TextMatcher,
    },
    Stylesheet {
        href_contains: String,
    },
    Contrast {
        selector: String,
        background_selector: Option<String>,
        min_ratio: f64,
    },
    Script {
        expected: Option<Value>,
    },
    Screenshot {
        name: String,
        full_page: bool,
        max_diff_percent: Option<f64>,
    },
}

/// `{ found, value }` returned by element probes
#[derive(Debug, Deserialize)]
struct Found {
    found: bool,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct BoxState {
    width: f64,
    height: f64,
    display: String,
    visibility: String,
    opacity: String,
}

#[derive(Debug, Deserialize)]
struct ContrastSample {
    color: String,
    /// Background colours from the innermost element outwards
    backgrounds: Vec<String>,
    #[serde(default)]
    background_found: bool,
}

impl Probe {
    fn compile(spec: &CheckSpec) -> E2eResult<Self> {
        let probe = match &spec.kind {
            CheckKind::Title { expect } => Probe::Title(TextMatcher::compile(expect, true)?),
            CheckKind::Element { selector, min, max } => Probe::Element {
                selector: selector.clone(),
                min: *min,
                max: *max,
            },
            CheckKind::Visible { selector, expected } => Probe::Visible {
                selector: selector.clone(),
                expected: *expected,
            },
            CheckKind::CssVariable {
                color,
                tolerance,
                expect,
                ..
            } => Probe::CssVariable(ValueMatcher::compile(color, *tolerance, expect)?),
            CheckKind::ComputedStyle {
                selector,
                color,
                tolerance,
                expect,
                ..
            } => Probe::ComputedStyle {
                selector: selector.clone(),
                expect: ValueMatcher::compile(color, *tolerance, expect)?,
            },
            CheckKind::ColorUsage {
                color,
                tolerance,
                min,
                max,
                ..
            } => Probe::ColorUsage {
                source: color.clone(),
                color: parse_color(color)?,
                tolerance: *tolerance,
                min: *min,
                max: *max,
            },
            CheckKind::Attribute { selector, expect, .. } => Probe::Attribute {
                selector: selector.clone(),
                expect: TextMatcher::compile(expect, false)?,
            },
            CheckKind::Text { selector, expect } => Probe::Text {
                selector: selector.clone(),
                expect: TextMatcher::compile(expect, false)?,
            },
            CheckKind::LocalStorage { key, absent, expect } => Probe::LocalStorage {
                key: key.clone(),
                absent: *absent,
                expect: TextMatcher::compile(expect, false)?,
            },
            CheckKind::Stylesheet { href_contains } => Probe::Stylesheet {
                href_contains: href_contains.clone(),
            },
            CheckKind::Contrast {
                selector,
                background_selector,
                min_ratio,
            } => Probe::Contrast {
                selector: selector.clone(),
                background_selector: background_selector.clone(),
                min_ratio: *min_ratio,
            },
            CheckKind::Script { expected, .. } => Probe::Script {
                expected: expected.clone(),
            },
            CheckKind::ScreenshotMatches {
                baseline,
                full_page,
                max_diff_percent,
            } => Probe::Screenshot {
                name: baseline.clone().unwrap_or_else(|| spec.name.clone()),
                full_page: *full_page,
                max_diff_percent: *max_diff_percent,
            },
        };
        Ok(probe)
    }

    fn judge(&self, value: Value) -> Result<CheckOutcome, CheckFault> {
        let outcome = match self {
            Probe::Title(expect) => expect.outcome(&text_of(&value)),

            Probe::Element { selector, min, max } => {
                let count = value.as_u64().unwrap_or(0) as usize;
                if count < *min {
                    CheckOutcome::fail(format!(
                        "expected at least {} match(es) for '{}', found {}",
                        min, selector, count
                    ))
                } else if max.map(|max| count > max).unwrap_or(false) {
                    CheckOutcome::fail(format!(
                        "expected at most {} match(es) for '{}', found {}",
                        max.unwrap_or_default(),
                        selector,
                        count
                    ))
                } else {
                    CheckOutcome::pass(format!("{} match(es) for '{}'", count, selector))
                }
            }

            Probe::Visible { selector, expected } => {
                let found: Found = serde_json::from_value(value)?;
                let (visible, detail) = if found.found {
                    let state: BoxState = serde_json::from_value(found.value)?;
                    describe_box(&state)
                } else {
                    (false, "absent".to_string())
                };
                let word = if *expected { "visible" } else { "hidden" };
                CheckOutcome::new(
                    visible == *expected,
                    format!("expected '{}' to be {}, it is {}", selector, word, detail),
                )
            }

            Probe::CssVariable(expect) => expect.outcome(&text_of(&value)),

            Probe::ComputedStyle { selector, expect } => match found_value(value, selector)? {
                Ok(v) => expect.outcome(&text_of(&v)),
                Err(missing) => missing,
            },

            Probe::ColorUsage {
                source,
                color,
                tolerance,
                min,
                max,
            } => {
                let styles: HashMap<String, u64> = serde_json::from_value(value)?;
                let count: u64 = styles
                    .iter()
                    .filter(|(style, _)| {
                        find_colors(style)
                            .iter()
                            .any(|c| !c.is_transparent() && c.matches(color, *tolerance))
                    })
                    .map(|(_, n)| n)
                    .sum();
                let count = count as usize;
                if count < *min {
                    CheckOutcome::fail(format!(
                        "expected at least {} element(s) using {}, found {}",
                        min, source, count
                    ))
                } else if max.map(|max| count > max).unwrap_or(false) {
                    CheckOutcome::fail(format!(
                        "expected at most {} element(s) using {}, found {}",
                        max.unwrap_or_default(),
                        source,
                        count
                    ))
                } else {
                    CheckOutcome::pass(format!("{} element(s) use {}", count, source))
                }
            }

            Probe::Attribute { selector, expect } | Probe::Text { selector, expect } => {
                match found_value(value, selector)? {
                    Ok(Value::Null) => CheckOutcome::fail(format!("'{}' has no such value", selector)),
                    Ok(v) => expect.outcome(&text_of(&v)),
                    Err(missing) => missing,
                }
            }

            Probe::LocalStorage { key, absent, expect } => match (&value, absent) {
                (Value::Null, true) => CheckOutcome::pass(format!("'{}' is not stored", key)),
                (_, true) => CheckOutcome::fail(format!(
                    "expected '{}' to be absent, got '{}'",
                    key,
                    text_of(&value)
                )),
                (Value::Null, false) => CheckOutcome::fail(format!("'{}' is not stored", key)),
                (v, false) => expect.outcome(&text_of(v)),
            },

            Probe::Stylesheet { href_contains } => {
                let hrefs: Vec<String> = serde_json::from_value(value)?;
                match hrefs.iter().find(|h| h.contains(href_contains.as_str())) {
                    Some(href) => CheckOutcome::pass(href.clone()),
                    None => CheckOutcome::fail(format!(
                        "no stylesheet link contains '{}' ({} linked)",
                        href_contains,
                        hrefs.len()
                    )),
                }
            }

            Probe::Contrast {
                selector,
                background_selector,
                min_ratio,
            } => {
                if value.is_null() {
                    return Ok(missing_element(selector));
                }
                let sample: ContrastSample = serde_json::from_value(value)?;
                if let (Some(bg), false) = (background_selector, sample.background_found) {
                    return Ok(missing_element(bg));
                }
                let background = sample
                    .backgrounds
                    .iter()
                    .rev()
                    .try_fold(Rgba::WHITE, |under, layer| {
                        layer.parse::<Rgba>().map(|c| c.over(&under))
                    })?;
                let foreground = sample.color.parse::<Rgba>()?.over(&background);
                let ratio = contrast_ratio(&foreground, &background);
                let detail = format!(
                    "{:.2}:1 ({}) for {} on {}",
                    ratio,
                    WcagRating::from_ratio(ratio),
                    foreground.to_hex(),
                    background.to_hex()
                );
                if ratio >= *min_ratio {
                    CheckOutcome::pass(detail)
                } else {
                    CheckOutcome::fail(format!("{}, below {}:1", detail, min_ratio))
                }
            }

            Probe::Script { expected } => match expected {
                Some(expected) if *expected == value => CheckOutcome::pass(value.to_string()),
                Some(expected) => {
                    CheckOutcome::fail(format!("expected {}, got {}", expected, value))
                }
                None if truthy(&value) => CheckOutcome::pass(value.to_string()),
                None => CheckOutcome::fail(format!("expected a truthy value, got {}", value)),
            },

            Probe::Screenshot { .. } => {
                return Err(CheckFault::new("screenshot checks are not judged from a value"))
            }
        };
        Ok(outcome)
    }
}

fn parse_color(source: &str) -> E2eResult<Rgba> {
    source
        .parse::<Rgba>()
        .map_err(|e| E2eError::Config(e.to_string()))
}

fn missing_element(selector: &str) -> CheckOutcome {
    CheckOutcome::fail(format!("no element matches '{}'", selector))
}

/// Unwrap a `{ found, value }` probe result; a missing element is a failed outcome
fn found_value(value: Value, selector: &str) -> Result<Result<Value, CheckOutcome>, CheckFault> {
    let found: Found = serde_json::from_value(value)?;
    Ok(if found.found {
        Ok(found.value)
    } else {
        Err(missing_element(selector))
    })
}

fn describe_box(state: &BoxState) -> (bool, String) {
    if state.display == "none" {
        (false, "hidden (display: none)".to_string())
    } else if state.visibility == "hidden" || state.visibility == "collapse" {
        (false, format!("hidden (visibility: {})", state.visibility))
    } else if state.opacity.parse::<f64>().map(|o| o == 0.0).unwrap_or(false) {
        (false, "hidden (opacity: 0)".to_string())
    } else if state.width <= 0.0 || state.height <= 0.0 {
        (false, format!("hidden ({}x{} box)", state.width, state.height))
    } else {
        (true, format!("visible ({}x{})", state.width, state.height))
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A string as a JavaScript string literal
fn js(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Run `body` against the first match of `selector`, wrapped as `{ found, value }`
fn on_element(selector: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return {{ found: false }}; \
         return {{ found: true, value: {} }}; }})()",
        js(selector),
        body
    )
}

/// The page expression a check kind evaluates, if any
fn expression(kind: &CheckKind) -> Option<String> {
    let script = match kind {
        CheckKind::Title { .. } => "document.title".to_string(),
        CheckKind::Element { selector, .. } => {
            format!("document.querySelectorAll({}).length", js(selector))
        }
        CheckKind::Visible { selector, .. } => on_element(
            selector,
            "(() => { const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return { width: r.width, height: r.height, display: s.display, \
             visibility: s.visibility, opacity: s.opacity }; })()",
        ),
        CheckKind::CssVariable { variable, .. } => format!(
            "getComputedStyle(document.documentElement).getPropertyValue({}).trim()",
            js(variable)
        ),
        CheckKind::ComputedStyle {
            selector, property, ..
        } => on_element(
            selector,
            &format!("getComputedStyle(el).getPropertyValue({}).trim()", js(property)),
        ),
        CheckKind::ColorUsage { properties, .. } => format!(
            "(() => {{ const props = {}; const counts = {{}}; \
             for (const el of document.querySelectorAll('*')) {{ \
             const s = getComputedStyle(el); \
             const key = props.map((p) => s.getPropertyValue(p)).join(' | '); \
             counts[key] = (counts[key] || 0) + 1; }} \
             return counts; }})()",
            serde_json::to_string(properties).unwrap_or_else(|_| "[]".to_string())
        ),
        CheckKind::Attribute {
            selector, attribute, ..
        } => on_element(selector, &format!("el.getAttribute({})", js(attribute))),
        CheckKind::Text { selector, .. } => on_element(selector, "el.textContent.trim()"),
        CheckKind::LocalStorage { key, .. } => format!("localStorage.getItem({})", js(key)),
        CheckKind::Stylesheet { .. } => {
            "Array.from(document.querySelectorAll('link[rel=\"stylesheet\"]')).map((l) => l.href)"
                .to_string()
        }
        CheckKind::Contrast {
            selector,
            background_selector,
            ..
        } => format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; \
             const bgSel = {}; const bgEl = bgSel ? document.querySelector(bgSel) : null; \
             const backgrounds = []; \
             for (let n = bgEl || el; n && n.nodeType === 1; n = n.parentElement) \
             backgrounds.push(getComputedStyle(n).backgroundColor); \
             return {{ color: getComputedStyle(el).color, backgrounds, background_found: !!bgEl }}; }})()",
            js(selector),
            background_selector
                .as_deref()
                .map(js)
                .unwrap_or_else(|| "null".to_string())
        ),
        CheckKind::Script { expression, .. } => expression.clone(),
        CheckKind::ScreenshotMatches { .. } => return None,
    };
    Some(script)
}
