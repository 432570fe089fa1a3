//! Checks and their outcomes

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CheckFault;

/// Something that can inspect page state and decide pass or fail.
#[async_trait]
pub trait Evaluate: Send + Sync {
    async fn evaluate(&self) -> Result<CheckOutcome, CheckFault>;
}

struct FnEvaluator<F>(F);

#[async_trait]
impl<F, Fut> Evaluate for FnEvaluator<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckOutcome, CheckFault>> + Send,
{
    async fn evaluate(&self) -> Result<CheckOutcome, CheckFault> {
        (self.0)().await
    }
}

/// A named predicate evaluated against a page during a run.
///
/// Checks hold no results and can be run any number of times. Cloning is
/// cheap; clones share the evaluator.
#[derive(Clone)]
pub struct Check {
    name: String,
    critical: bool,
    evaluator: Arc<dyn Evaluate>,
}

impl Check {
    pub fn new(name: impl Into<String>, evaluator: impl Evaluate + 'static) -> Self {
        Self {
            name: name.into(),
            critical: false,
            evaluator: Arc::new(evaluator),
        }
    }

    /// Build a check from an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckOutcome, CheckFault>> + Send + 'static,
    {
        Self::new(name, FnEvaluator(f))
    }

    /// Mark this check as must-pass
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub async fn evaluate(&self) -> Result<CheckOutcome, CheckFault> {
        self.evaluator.evaluate().await
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .finish_non_exhaustive()
    }
}

/// Result of evaluating one check.
///
/// `error` is only set when evaluation faulted; such an outcome never passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    passed: bool,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckOutcome {
    pub fn new(passed: bool, detail: impl Into<String>) -> Self {
        Self {
            passed,
            detail: detail.into(),
            error: None,
        }
    }

    pub fn pass(detail: impl Into<String>) -> Self {
        Self::new(true, detail)
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self::new(false, detail)
    }

    pub(crate) fn faulted(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_fn_is_reusable() {
        let check = Check::from_fn("always", || async { Ok(CheckOutcome::pass("ok")) });
        let first = check.evaluate().await.unwrap();
        let second = check.clone().evaluate().await.unwrap();
        assert_eq!(first, second);
        assert!(!check.is_critical());
        assert!(check.clone().critical().is_critical());
    }

    #[test]
    fn test_faulted_outcome_never_passes() {
        let outcome = CheckOutcome::faulted("boom");
        assert!(!outcome.passed());
        assert_eq!(outcome.error(), Some("boom"));
        assert!(outcome.detail().is_empty());
    }

    #[test]
    fn test_outcome_serializes_error_only_when_faulted() {
        let passed = serde_json::to_value(CheckOutcome::pass("ok")).unwrap();
        assert_eq!(passed, serde_json::json!({"passed": true, "detail": "ok"}));

        let faulted = serde_json::to_value(CheckOutcome::faulted("boom")).unwrap();
        assert_eq!(
            faulted,
            serde_json::json!({"passed": false, "detail": "", "error": "boom"})
        );
    }
}
