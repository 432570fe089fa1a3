//! Run reports and their text rendering

use std::fmt;

use serde::Serialize;

use crate::check::CheckOutcome;

/// One check's entry in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    name: String,
    critical: bool,
    outcome: CheckOutcome,
}

impl CheckRecord {
    pub(crate) fn new(name: String, critical: bool, outcome: CheckOutcome) -> Self {
        Self {
            name,
            critical,
            outcome,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn outcome(&self) -> &CheckOutcome {
        &self.outcome
    }

    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }
}

/// Aggregate result of running a list of checks once.
///
/// All counts are derived when the report is built and cannot change
/// afterwards. `score` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    outcomes: Vec<CheckRecord>,
    threshold: f64,
    pass_count: usize,
    total_count: usize,
    score: f64,
    overall_passed: bool,
}

impl RunReport {
    pub(crate) fn new(outcomes: Vec<CheckRecord>, threshold: f64) -> Self {
        let total_count = outcomes.len();
        let pass_count = outcomes.iter().filter(|r| r.passed()).count();
        let score = if total_count == 0 {
            0.0
        } else {
            pass_count as f64 / total_count as f64
        };
        let critical_failed = outcomes.iter().any(|r| r.critical && !r.passed());
        let overall_passed = !critical_failed && score >= threshold;

        Self {
            outcomes,
            threshold,
            pass_count,
            total_count,
            score,
            overall_passed,
        }
    }

    /// Outcomes in declaration order
    pub fn outcomes(&self) -> &[CheckRecord] {
        &self.outcomes
    }

    pub fn get(&self, name: &str) -> Option<&CheckRecord> {
        self.outcomes.iter().find(|r| r.name == name)
    }

    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn overall_passed(&self) -> bool {
        self.overall_passed
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckRecord> {
        self.outcomes.iter().filter(|r| !r.passed())
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &CheckRecord> {
        self.failures().filter(|r| r.critical)
    }

    /// `PASS`, `FAIL`, or `FAIL (critical: a, b)` when critical checks failed
    pub fn verdict(&self) -> String {
        if self.overall_passed {
            return "PASS".to_string();
        }
        let critical: Vec<&str> = self.critical_failures().map(|r| r.name()).collect();
        if critical.is_empty() {
            "FAIL".to_string()
        } else {
            format!("FAIL (critical: {})", critical.join(", "))
        }
    }

    pub fn format(&self) -> String {
        format_report(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_report(self))
    }
}

/// Render a report as one line per check plus a summary line.
///
/// ```text
/// ✓ hasTitle - title non-empty
/// ✗ hasBeautyVariable - expected '#f3e6d0', got ''
/// 1/2 checks passed (50.0%), threshold 70.0%: FAIL
/// ```
///
/// Score and threshold are printed with [`percent`].
/// Lines are joined with `\n` without a trailing newline.
pub fn format_report(report: &RunReport) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(report.outcomes.len() + 1);

    for record in &report.outcomes {
        let marker = if record.passed() { "✓" } else { "✗" };
        let mut line = format!("{} {}", marker, record.name);
        if record.critical {
            line.push_str(" [critical]");
        }

        let outcome = &record.outcome;
        if let Some(error) = outcome.error() {
            line.push_str(&format!(" - error: {}", error));
        } else if !outcome.detail().is_empty() {
            line.push_str(&format!(" - {}", outcome.detail()));
        }
        lines.push(line);
    }

    lines.push(format!(
        "{}/{} checks passed ({}), threshold {}: {}",
        report.pass_count,
        report.total_count,
        percent(report.score),
        percent(report.threshold),
        report.verdict(),
    ));

    lines.join("\n")
}

/// A fraction as a percentage truncated to one decimal place, e.g. `66.6%`.
///
/// Truncation keeps the order of score and threshold: a score below a
/// threshold in whole or tenth percents never prints at or above it.
pub fn percent(fraction: f64) -> String {
    let tenths = (fraction * 1000.0 + 1e-9).floor();
    format!("{:.1}%", tenths / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, critical: bool, outcome: CheckOutcome) -> CheckRecord {
        CheckRecord::new(name.to_string(), critical, outcome)
    }

    #[test]
    fn test_counts_are_derived() {
        let report = RunReport::new(
            vec![
                record("a", false, CheckOutcome::pass("")),
                record("b", false, CheckOutcome::fail("")),
                record("c", false, CheckOutcome::faulted("boom")),
            ],
            0.3,
        );
        assert_eq!(report.pass_count(), 1);
        assert_eq!(report.total_count(), 3);
        assert!((report.score() - 1.0 / 3.0).abs() < 1e-9);
        assert!(report.overall_passed());
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn test_format_marks_critical_and_errors() {
        let report = RunReport::new(
            vec![
                record("pageLoaded", true, CheckOutcome::faulted("net::ERR_CONNECTION_REFUSED")),
                record("hasHero", false, CheckOutcome::pass("")),
            ],
            0.5,
        );
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "✗ pageLoaded [critical] - error: net::ERR_CONNECTION_REFUSED",
                "✓ hasHero",
                "1/2 checks passed (50.0%), threshold 50.0%: FAIL (critical: pageLoaded)",
            ]
        );
    }

    #[test]
    fn test_verdict_names_critical_failures() {
        let report = RunReport::new(
            vec![
                record("a", true, CheckOutcome::fail("")),
                record("b", true, CheckOutcome::pass("")),
                record("c", true, CheckOutcome::faulted("boom")),
            ],
            0.0,
        );
        assert_eq!(report.verdict(), "FAIL (critical: a, c)");

        let below = RunReport::new(vec![record("a", false, CheckOutcome::fail(""))], 0.5);
        assert_eq!(below.verdict(), "FAIL");
    }

    #[test]
    fn test_percent_truncates_to_tenths() {
        assert_eq!(percent(2.0 / 3.0), "66.6%");
        assert_eq!(percent(0.67), "67.0%");
        assert_eq!(percent(0.29), "29.0%");
        assert_eq!(percent(0.6696), "66.9%");
        assert_eq!(percent(1.0), "100.0%");
        assert_eq!(percent(0.0), "0.0%");
    }
}
