//! Suite Commands
//!
//! Offline listing and validation of YAML suites.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use hairathome_e2e::{RunnerConfig, SuiteSpec};
use serde::Serialize;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ValidateArgs {
    /// Suite files to validate; defaults to every suite in the specs directory
    pub suites: Vec<PathBuf>,
}

/// Suite summary for display
#[derive(Serialize, Clone)]
pub struct SuiteRow {
    pub name: String,
    pub groups: usize,
    pub checks: usize,
    pub tags: Vec<String>,
    pub file: String,
    /// `None` when valid
    pub error: Option<String>,
}

impl SuiteRow {
    fn from_spec(spec: &SuiteSpec, error: Option<String>) -> Self {
        Self {
            name: spec.name.clone(),
            groups: spec.groups.len(),
            checks: spec.check_count(),
            tags: spec.tags.clone(),
            file: spec
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error,
        }
    }

    fn unparsed(path: &Path, error: String) -> Self {
        Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            groups: 0,
            checks: 0,
            tags: Vec::new(),
            file: path.display().to_string(),
            error: Some(error),
        }
    }
}

impl TableDisplay for SuiteRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Groups", "Checks", "Tags", "File", "Status"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.groups.to_string(),
            self.checks.to_string(),
            self.tags.join(", "),
            self.file.clone(),
            self.error.clone().unwrap_or_else(|| "ok".to_string()),
        ]
    }
}

/// Explicit files, or everything under the configured specs directory
pub fn suite_paths(explicit: &[PathBuf], config: &RunnerConfig) -> Result<Vec<PathBuf>> {
    if explicit.is_empty() {
        Ok(SuiteSpec::discover(&config.specs_dir)?)
    } else {
        Ok(explicit.to_vec())
    }
}

/// Parse and validate each suite, keeping going past bad ones
pub fn inspect(paths: &[PathBuf]) -> Vec<SuiteRow> {
    paths
        .iter()
        .map(|path| match SuiteSpec::from_file(path) {
            Ok(spec) => {
                let error = spec.validate().err().map(|e| e.to_string());
                SuiteRow::from_spec(&spec, error)
            }
            Err(e) => SuiteRow::unparsed(path, e.to_string()),
        })
        .collect()
}

/// Returns whether every suite is valid
pub async fn execute_validate(
    args: ValidateArgs,
    config: &RunnerConfig,
    format: OutputFormat,
) -> Result<bool> {
    let rows = inspect(&suite_paths(&args.suites, config)?);
    print_list(&rows, format)?;
    Ok(rows.iter().all(|r| r.error.is_none()))
}

pub async fn execute_list(config: &RunnerConfig, format: OutputFormat) -> Result<bool> {
    let rows = inspect(&suite_paths(&[], config)?);
    print_list(&rows, format)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "name: good\ntags: [smoke]\ngroups: [{name: g, url: /, checks: [{name: t, kind: title}]}]\n";

    #[test]
    fn test_inspect_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        let dup = dir.path().join("dup.yaml");
        let broken = dir.path().join("broken.yaml");
        std::fs::write(&good, GOOD).unwrap();
        std::fs::write(
            &dup,
            "name: dup\ngroups: [{name: g, checks: [{name: t, kind: title}, {name: t, kind: title}]}]\n",
        )
        .unwrap();
        std::fs::write(&broken, "groups: [").unwrap();

        let rows = inspect(&[good, dup, broken]);
        assert!(rows[0].error.is_none());
        assert_eq!(rows[0].checks, 1);
        assert_eq!(rows[0].row()[3], "smoke");
        assert!(rows[1].error.as_ref().unwrap().contains("duplicate check name"));
        assert_eq!(rows[2].name, "broken");
        assert!(rows[2].error.is_some());
    }

    #[test]
    fn test_suite_paths_defaults_to_specs_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), GOOD).unwrap();
        std::fs::write(dir.path().join("a.yml"), GOOD).unwrap();
        let config = RunnerConfig {
            specs_dir: dir.path().to_path_buf(),
            ..RunnerConfig::default()
        };

        let paths = suite_paths(&[], &config).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.yml"));

        let explicit = suite_paths(&[PathBuf::from("x.yaml")], &config).unwrap();
        assert_eq!(explicit, vec![PathBuf::from("x.yaml")]);
    }
}
