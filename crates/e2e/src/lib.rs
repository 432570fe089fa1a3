//! Hair@Home browser checks
//!
//! Runs declarative check suites against the Hair@Home site through
//! Playwright:
//! - Optionally spawns `hugo server` and waits for it to answer
//! - Drives one long-lived Playwright page over a JSON-lines bridge
//! - Parses YAML suites into groups of checks
//! - Hands each group to the page assertion harness and collects reports
//! - Compares screenshots against stored baselines
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SuiteRunner (caller)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  for each group:                                            │
//! │    ├── goto(url), set_viewport, settle        (PageDriver)  │
//! │    ├── setup steps: click / wait / evaluate   (PageDriver)  │
//! │    ├── build_checks(group.checks) -> [Check]  (checks)      │
//! │    └── PageAssertionHarness::run -> RunReport (common)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteSpec (YAML)                                           │
//! │    ├── name, description, tags, threshold                   │
//! │    └── groups: [GroupSpec]                                  │
//! │          ├── url, viewport, settle_ms, threshold            │
//! │          ├── setup: [SetupStep]                             │
//! │          └── checks: [CheckSpec]                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod checks;
pub mod driver;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;
pub mod visual;

pub use checks::build_checks;
pub use driver::PageDriver;
pub use error::{E2eError, E2eResult};
pub use playwright::PlaywrightPage;
pub use runner::{GroupOutcome, GroupResult, RunnerConfig, SuiteResult, SuiteRunner};
pub use spec::{CheckSpec, GroupSpec, SetupStep, SuiteSpec};
