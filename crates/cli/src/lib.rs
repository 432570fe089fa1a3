//! Hair@Home check runner CLI
//!
//! Runs YAML check suites against the Hair@Home site and reports each
//! group's pass/fail verdict.

pub mod commands;
pub mod output;
