//! Run Command
//!
//! Runs suites in a real browser and prints their reports.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use hairathome_e2e::playwright::Browser;
use hairathome_e2e::{RunnerConfig, SuiteResult, SuiteRunner, SuiteSpec};
use tracing::info;

use crate::output::{render_serialized, suite_table, suite_text, OutputFormat};

#[derive(Args, Default)]
pub struct RunArgs {
    /// Suite files to run; defaults to every suite in the specs directory
    pub suites: Vec<PathBuf>,

    /// Site root that relative URLs resolve against
    #[arg(long, env = "HAIRATHOME_BASE_URL")]
    pub base_url: Option<String>,

    /// Default pass threshold (0.0 - 1.0)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Browser engine: chromium, firefox or webkit
    #[arg(long, value_parser = parse_browser)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Start `hugo server` before running
    #[arg(long)]
    pub serve: bool,

    /// Only run suites with this tag
    #[arg(long, conflicts_with_all = ["suites", "name"])]
    pub tag: Option<String>,

    /// Only run the suite with this name
    #[arg(long, conflicts_with = "suites")]
    pub name: Option<String>,

    /// Directory for results and failure screenshots
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Rewrite screenshot baselines from this run
    #[arg(long)]
    pub update_baselines: bool,
}

fn parse_browser(s: &str) -> Result<Browser, String> {
    s.parse().map_err(|e: hairathome_e2e::E2eError| e.to_string())
}

impl RunArgs {
    /// Fold command-line overrides into the file configuration
    pub fn apply(&self, config: &mut RunnerConfig) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                bail!("threshold {} is outside [0, 1]", threshold);
            }
            config.threshold = threshold;
        }
        if let Some(browser) = self.browser {
            config.browser.browser = browser;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.serve {
            config.server.enabled = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.update_baselines {
            config.visual.update_baselines = true;
        }
        Ok(())
    }
}

/// Parse and validate suites given by path
pub fn load_explicit(paths: &[PathBuf]) -> Result<Vec<SuiteSpec>> {
    let mut suites = Vec::with_capacity(paths.len());
    for path in paths {
        let suite = SuiteSpec::from_file(path)?;
        suite.validate()?;
        suites.push(suite);
    }
    Ok(suites)
}

async fn run_selected(args: &RunArgs, runner: &mut SuiteRunner) -> Result<Vec<SuiteResult>> {
    let results = if !args.suites.is_empty() {
        let suites = load_explicit(&args.suites)?;
        info!("Running {} suite file(s)", suites.len());
        runner.run_suites(&suites).await?
    } else if let Some(name) = &args.name {
        vec![runner.run_named(name).await?]
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await?
    } else {
        runner.run_all().await?
    };

    if results.is_empty() {
        bail!("no suites found in {}", runner.config().specs_dir.display());
    }
    Ok(results)
}

/// Returns whether every group of every suite passed
pub async fn execute(args: RunArgs, mut config: RunnerConfig, format: OutputFormat) -> Result<bool> {
    args.apply(&mut config)?;

    let mut runner = SuiteRunner::with_config(config)?;
    let results = run_selected(&args, &mut runner).await;
    runner.stop_server()?;
    let results = results?;

    if let Some(serialized) = render_serialized(&results, format)? {
        println!("{}", serialized);
    } else if format == OutputFormat::Table {
        println!("{}", suite_table(&results));
    } else {
        let texts: Vec<String> = results.iter().map(suite_text).collect();
        println!("{}", texts.join("\n\n"));
    }

    Ok(results.iter().all(|r| r.passed))
}
