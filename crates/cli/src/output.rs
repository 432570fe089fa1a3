//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hairathome_common::percent;
use hairathome_e2e::{GroupOutcome, SuiteResult};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Report text, as the harness formats it
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Human-readable table format
    Table,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Serialise a value as JSON or YAML
pub fn render_serialized<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<Option<String>> {
    Ok(match format {
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
        OutputFormat::Text | OutputFormat::Table => None,
    })
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(
    items: &[T],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(serialized) = render_serialized(items, format)? {
        println!("{}", serialized);
        return Ok(());
    }
    if items.is_empty() {
        println!("No items found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        _ => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                for (header, value) in T::headers().iter().zip(item.row()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
    Ok(())
}

/// Colour a formatted report: check lines by glyph, the summary by verdict
pub fn colorize_report(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.starts_with('✓') {
                line.green().to_string()
            } else if line.starts_with('✗') {
                line.red().to_string()
            } else if line.ends_with(": PASS") {
                line.green().bold().to_string()
            } else if line.contains(": FAIL") {
                line.red().bold().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain report text for one suite result
pub fn suite_text(result: &SuiteResult) -> String {
    let mut out = Vec::new();
    let verdict = if result.passed { "PASS".green() } else { "FAIL".red() };
    out.push(format!(
        "{} {} ({}/{} groups, {} ms)",
        verdict.bold(),
        result.suite.bold(),
        result.passed_groups(),
        result.groups.len(),
        result.duration_ms
    ));

    for group in &result.groups {
        let mut heading = format!("── {}", group.name);
        if let Some(url) = &group.url {
            heading.push_str(&format!(" [{}]", url));
        }
        if let Some(v) = &group.viewport {
            heading.push_str(&format!(" @ {}x{}", v.width, v.height));
        }
        out.push(heading.cyan().to_string());

        match &group.outcome {
            GroupOutcome::Completed { report } => out.push(colorize_report(&report.format())),
            GroupOutcome::Aborted { step, error } => {
                out.push(format!("aborted at {}: {}", step, error).red().to_string())
            }
        }
        if let Some(path) = &group.failure_screenshot {
            out.push(format!("screenshot: {}", path.display()).dimmed().to_string());
        }
    }
    out.join("\n")
}

/// One row per group
pub fn suite_table(results: &[SuiteResult]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Suite", "Group", "Passed", "Score", "Threshold", "Result"]);
    for result in results {
        for group in &result.groups {
            let (passed, score, threshold, verdict) = match &group.outcome {
                GroupOutcome::Completed { report } => (
                    format!("{}/{}", report.pass_count(), report.total_count()),
                    percent(report.score()),
                    percent(report.threshold()),
                    report.verdict(),
                ),
                GroupOutcome::Aborted { step, .. } => (
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    format!("ABORTED ({})", step),
                ),
            };
            table.add_row(vec![
                result.suite.clone(),
                group.name.clone(),
                passed,
                score,
                threshold,
                verdict,
            ]);
        }
    }
    table
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}
