//! Error types for the page assertion harness

use thiserror::Error;

/// Invalid harness invocation. The only error `run()` ever returns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No checks supplied")]
    EmptyChecks,

    #[error("Threshold {0} is outside the range [0, 1]")]
    ThresholdOutOfRange(f64),

    #[error("Duplicate check name: {0}")]
    DuplicateCheck(String),
}

/// A check could not produce an outcome.
///
/// Faults never escape a run: the harness records them as failed outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CheckFault {
    message: String,
}

impl CheckFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PageError> for CheckFault {
    fn from(e: PageError) -> Self {
        CheckFault::new(e.to_string())
    }
}

impl From<serde_json::Error> for CheckFault {
    fn from(e: serde_json::Error) -> Self {
        CheckFault::new(format!("Unexpected page value: {}", e))
    }
}

impl From<ColorParseError> for CheckFault {
    fn from(e: ColorParseError) -> Self {
        CheckFault::new(e.to_string())
    }
}

/// Errors surfaced by a page handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Page command timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("Page is closed")]
    Closed,
}

/// A string that is not a CSS colour we understand
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid colour: '{0}'")]
pub struct ColorParseError(pub String);
