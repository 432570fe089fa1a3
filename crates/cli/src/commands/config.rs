//! Config Command
//!
//! Shows or initialises `hairathome.toml`.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use hairathome_e2e::RunnerConfig;

use crate::output::{print_success, render_serialized, OutputFormat};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

pub async fn execute(
    args: ConfigArgs,
    config: &RunnerConfig,
    path: &Path,
    format: OutputFormat,
) -> Result<bool> {
    if args.init {
        if path.exists() && !args.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        RunnerConfig::default().save(path)?;
        print_success(&format!("Wrote {}", path.display()));
        return Ok(true);
    }

    match render_serialized(config, format)? {
        Some(serialized) => println!("{}", serialized),
        None => print!("{}", toml::to_string_pretty(config)?),
    }
    Ok(true)
}
