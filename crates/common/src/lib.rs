//! Hair@Home Common Library
//!
//! The page assertion harness and the types it is built from:
//!
//! - [`Check`]: a named, reusable predicate over a live page
//! - [`CheckOutcome`]: the result of evaluating one check
//! - [`RunReport`]: the ordered, scored result of one harness run
//! - [`PageAssertionHarness`]: runs checks sequentially and scores them
//! - [`PageHandle`]: the one capability checks need from a browser driver
//!
//! Colour parsing and WCAG contrast maths live in [`color`].

pub mod check;
pub mod color;
pub mod error;
pub mod harness;
pub mod page;
pub mod report;

pub use check::{Check, CheckOutcome, Evaluate};
pub use color::{contrast_ratio, find_colors, Rgba, WcagRating};
pub use error::{CheckFault, ColorParseError, ConfigurationError, PageError};
pub use harness::{run, PageAssertionHarness, DEFAULT_THRESHOLD};
pub use page::PageHandle;
pub use report::{format_report, percent, CheckRecord, RunReport};

/// Hair@Home tooling version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
