//! Error types for browser checks

use hairathome_common::{ConfigurationError, PageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Site server failed to start: {0}")]
    ServerStartup(String),

    #[error("Site server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge error: {0}")]
    Bridge(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("Suite parse error in {path}: {reason}")]
    SpecParse { path: String, reason: String },

    #[error("Invalid suite '{suite}': {reason}")]
    SpecInvalid { suite: String, reason: String },

    #[error("Suite not found: {0}")]
    SuiteNotFound(String),

    #[error("Harness configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Visual comparison error: {0}")]
    Visual(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<toml::de::Error> for E2eError {
    fn from(e: toml::de::Error) -> Self {
        E2eError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for E2eError {
    fn from(e: toml::ser::Error) -> Self {
        E2eError::Config(e.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
