//! hairathome-check - Main Entry Point
//!
//! Runs YAML page-check suites against the Hair@Home site.
//! Exit status: 0 when everything passed, 1 when a check group failed,
//! 2 when the run could not be carried out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hairathome_cli::commands::{config, contrast, run, suites};
use hairathome_cli::output::{self, LogFormat, OutputFormat};
use hairathome_e2e::RunnerConfig;
use tracing_subscriber::EnvFilter;

/// Hair@Home page checks
#[derive(Parser)]
#[command(name = "hairathome-check")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "hairathome.toml", env = "HAIRATHOME_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites in a browser
    Run(run::RunArgs),

    /// Parse and validate suites without a browser
    Validate(suites::ValidateArgs),

    /// List suites in the specs directory
    List,

    /// WCAG contrast ratio between two colours (exits 1 below AA)
    Contrast(contrast::ContrastArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let settings = RunnerConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => run::execute(args, settings, cli.format).await,
        Commands::Validate(args) => suites::execute_validate(args, &settings, cli.format).await,
        Commands::List => suites::execute_list(&settings, cli.format).await,
        Commands::Contrast(args) => contrast::execute(args, cli.format).await,
        Commands::Config(args) => config::execute(args, &settings, &cli.config, cli.format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hairathome-check",
            "run",
            "--tag",
            "theme",
            "--format",
            "json",
            "--headed",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.tag.as_deref(), Some("theme"));
                assert!(args.headed);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_selection_flags_conflict() {
        for argv in [
            vec!["hairathome-check", "run", "checks/home.yaml", "--tag", "theme"],
            vec!["hairathome-check", "run", "checks/home.yaml", "--name", "home"],
            vec!["hairathome-check", "run", "--tag", "theme", "--name", "home"],
        ] {
            assert!(Cli::try_parse_from(argv).is_err());
        }
        assert!(Cli::try_parse_from(["hairathome-check", "run", "--name", "home"]).is_ok());
    }
}
