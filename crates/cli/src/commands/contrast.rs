//! Contrast Command
//!
//! Offline WCAG contrast between two CSS colours.

use anyhow::{Context, Result};
use clap::Args;
use hairathome_common::{contrast_ratio, Rgba, WcagRating};
use serde::Serialize;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ContrastArgs {
    /// Text colour, e.g. '#ffffff' or 'rgb(255 255 255)'
    pub foreground: String,

    /// Background colour; translucent backgrounds are composited over white
    pub background: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct ContrastReport {
    pub foreground: String,
    pub background: String,
    pub ratio: f64,
    pub rating: String,
    pub aa: bool,
    pub aaa: bool,
}

impl ContrastReport {
    pub fn measure(foreground: &str, background: &str) -> Result<Self> {
        let bg = background
            .parse::<Rgba>()
            .with_context(|| format!("background '{}'", background))?
            .over(&Rgba::WHITE);
        let fg = foreground
            .parse::<Rgba>()
            .with_context(|| format!("foreground '{}'", foreground))?
            .over(&bg);
        let ratio = contrast_ratio(&fg, &bg);
        let rating = WcagRating::from_ratio(ratio);

        Ok(Self {
            foreground: fg.to_hex(),
            background: bg.to_hex(),
            ratio: (ratio * 100.0).round() / 100.0,
            rating: rating.to_string(),
            aa: ratio >= 4.5,
            aaa: ratio >= 7.0,
        })
    }
}

impl TableDisplay for ContrastReport {
    fn headers() -> Vec<&'static str> {
        vec!["Foreground", "Background", "Ratio", "Rating"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.foreground.clone(),
            self.background.clone(),
            format!("{:.2}:1", self.ratio),
            self.rating.clone(),
        ]
    }
}

/// Returns whether the pair meets WCAG AA for body text
pub async fn execute(args: ContrastArgs, format: OutputFormat) -> Result<bool> {
    let report = ContrastReport::measure(&args.foreground, &args.background)?;
    let aa = report.aa;
    print_list(&[report], format)?;
    Ok(aa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("#ffffff", "#050505", "AAA" ; "white on near black")]
    #[test_case("#d4af37", "#050505", "AAA" ; "gold on near black")]
    #[test_case("#777777", "#ffffff", "AA (large text)" ; "mid grey on white")]
    #[test_case("#eeeeee", "#ffffff", "FAIL" ; "pale grey on white")]
    fn test_measure_rating(fg: &str, bg: &str, rating: &str) {
        let report = ContrastReport::measure(fg, bg).unwrap();
        assert_eq!(report.rating, rating);
    }

    #[test]
    fn test_measure_reference_pair() {
        let report = ContrastReport::measure("white", "#050505").unwrap();
        assert!((report.ratio - 20.38).abs() < 0.05);
        assert!(report.aa && report.aaa);
        assert_eq!(report.background, "#050505");
    }

    #[test]
    fn test_measure_rejects_bad_colour() {
        let err = ContrastReport::measure("goldish", "#000").unwrap_err();
        assert!(format!("{:#}", err).contains("foreground 'goldish'"));
    }
}
