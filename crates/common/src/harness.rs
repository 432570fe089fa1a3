//! Sequential execution of checks against one loaded page

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::check::{Check, CheckOutcome};
use crate::error::ConfigurationError;
use crate::report::{percent, CheckRecord, RunReport};

/// Fraction of checks that must pass when no threshold is given
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Runs an ordered list of checks and scores the result.
///
/// Checks are awaited one at a time in declaration order: they share a live
/// page and must not observe each other mid-flight. The harness never touches
/// the page itself and keeps nothing between runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageAssertionHarness {
    threshold: f64,
}

impl Default for PageAssertionHarness {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PageAssertionHarness {
    pub fn new(threshold: f64) -> Result<Self, ConfigurationError> {
        validate_threshold(threshold)?;
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate every check and build a report.
    ///
    /// Only invalid input is an error. A check that returns `Err` or panics
    /// is recorded as a failed outcome carrying the message, and the run
    /// continues with the next check.
    pub async fn run(&self, checks: &[Check]) -> Result<RunReport, ConfigurationError> {
        validate_checks(checks)?;

        let mut outcomes = Vec::with_capacity(checks.len());

        for check in checks {
            debug!("Evaluating check: {}", check.name());

            let outcome = match AssertUnwindSafe(check.evaluate()).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(fault)) => {
                    warn!("Check '{}' faulted: {}", check.name(), fault);
                    CheckOutcome::faulted(fault.message())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("Check '{}' panicked: {}", check.name(), message);
                    CheckOutcome::faulted(format!("panicked: {}", message))
                }
            };

            if outcome.passed() {
                info!("✓ {}", check.name());
            } else if outcome.error().is_none() {
                info!("✗ {} - {}", check.name(), outcome.detail());
            }

            outcomes.push(CheckRecord::new(
                check.name().to_string(),
                check.is_critical(),
                outcome,
            ));
        }

        let report = RunReport::new(outcomes, self.threshold);

        info!(
            "Checks: {}/{} passed ({}), threshold {}, overall {}",
            report.pass_count(),
            report.total_count(),
            percent(report.score()),
            percent(report.threshold()),
            if report.overall_passed() { "passed" } else { "failed" },
        );

        Ok(report)
    }
}

/// Run `checks` once with the given threshold
pub async fn run(checks: &[Check], threshold: f64) -> Result<RunReport, ConfigurationError> {
    PageAssertionHarness::new(threshold)?.run(checks).await
}

fn validate_threshold(threshold: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigurationError::ThresholdOutOfRange(threshold))
    }
}

fn validate_checks(checks: &[Check]) -> Result<(), ConfigurationError> {
    if checks.is_empty() {
        return Err(ConfigurationError::EmptyChecks);
    }

    let mut seen = HashSet::with_capacity(checks.len());
    for check in checks {
        if !seen.insert(check.name()) {
            return Err(ConfigurationError::DuplicateCheck(check.name().to_string()));
        }
    }

    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_bounds() {
        assert!(PageAssertionHarness::new(0.0).is_ok());
        assert!(PageAssertionHarness::new(1.0).is_ok());
        assert_eq!(
            PageAssertionHarness::new(1.5),
            Err(ConfigurationError::ThresholdOutOfRange(1.5))
        );
        assert!(PageAssertionHarness::new(-0.1).is_err());
        assert!(PageAssertionHarness::new(f64::NAN).is_err());
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(PageAssertionHarness::default().threshold(), 0.7);
    }

    #[test]
    fn test_panic_message_downcasts() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
