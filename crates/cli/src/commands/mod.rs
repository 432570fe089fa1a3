//! CLI Commands

pub mod config;
pub mod contrast;
pub mod run;
pub mod suites;
