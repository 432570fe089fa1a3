//! Page control used by the suite runner between harness runs

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use hairathome_common::{PageError, PageHandle};
use serde::{Deserialize, Serialize};

/// A page the runner can navigate and resize.
///
/// Checks only ever read through [`PageHandle::evaluate`] (and screenshots
/// for visual checks); everything else here is for the caller, between runs.
#[async_trait]
pub trait PageDriver: PageHandle {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), PageError>;

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), PageError>;

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<(), PageError>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> Result<(), PageError>;

    async fn reload(&self, wait_until: WaitUntil) -> Result<(), PageError>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), PageError>;

    async fn close(&self) -> Result<(), PageError>;

    async fn sleep(&self, ms: u64) -> Result<(), PageError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const MOBILE: Viewport = Viewport { width: 375, height: 667 };
    pub const TABLET: Viewport = Viewport { width: 768, height: 1024 };
    pub const DESKTOP: Viewport = Viewport { width: 1280, height: 720 };
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::DESKTOP
    }
}

/// Navigation completion condition, as Playwright names them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    NetworkIdle,
    Commit,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle => "networkidle",
            WaitUntil::Commit => "commit",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}
