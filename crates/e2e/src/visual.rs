//! Screenshot baselines for `screenshot_matches` checks

use std::path::{Path, PathBuf};

use image::{Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Where baselines live and how strictly they are compared
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,

    /// Per-channel difference below which two pixels count as equal
    pub pixel_tolerance: u8,

    /// Default share of differing pixels allowed, in percent
    pub max_diff_percent: f64,

    /// Write the actual screenshot as the new baseline instead of comparing
    pub update_baselines: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("checks/baselines"),
            actual_dir: PathBuf::from("test-results/screenshots"),
            diff_dir: PathBuf::from("test-results/diffs"),
            pixel_tolerance: 5,
            max_diff_percent: 0.5,
            update_baselines: false,
        }
    }
}

/// Result of comparing one screenshot with its baseline
#[derive(Debug, Clone, Serialize)]
pub struct VisualDiff {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
    pub actual_hash: String,
    pub baseline_hash: String,
    /// The baseline was (re)written from this screenshot
    pub baseline_written: bool,
}

/// Pixel-level comparison of two images
#[derive(Debug)]
pub struct PixelDiff {
    pub diff_pixels: u64,
    pub total_pixels: u64,
    /// Differing pixels in red over a dimmed copy of the actual image
    pub image: RgbaImage,
}

impl PixelDiff {
    pub fn percent(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.diff_pixels as f64 / self.total_pixels as f64 * 100.0
        }
    }
}

/// Compare two images pixel by pixel.
///
/// Images of different sizes are compared over the union of both areas;
/// pixels present in only one image always count as different.
pub fn diff_images(actual: &RgbaImage, baseline: &RgbaImage, tolerance: u8) -> PixelDiff {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut image = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = (x < actual.width() && y < actual.height()).then(|| actual.get_pixel(x, y));
            let b =
                (x < baseline.width() && y < baseline.height()).then(|| baseline.get_pixel(x, y));

            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b, tolerance) => {
                    let c = a.channels();
                    image.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    image.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    PixelDiff {
        diff_pixels,
        total_pixels: width as u64 * height as u64,
        image,
    }
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>, tolerance: u8) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| x.abs_diff(*y) > tolerance)
}

/// Stored screenshots and the directories comparisons write into
pub struct VisualBaselines {
    config: VisualConfig,
}

impl VisualBaselines {
    pub fn new(config: VisualConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    /// Where a fresh screenshot named `name` should be written
    pub fn actual_path(&self, name: &str) -> PathBuf {
        self.config.actual_dir.join(format!("{}.png", file_stem(name)))
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(format!("{}.png", file_stem(name)))
    }

    /// Compare the actual screenshot for `name` against its baseline
    pub fn compare(&self, name: &str, max_diff_percent: Option<f64>) -> E2eResult<VisualDiff> {
        let max_diff = max_diff_percent.unwrap_or(self.config.max_diff_percent);
        let actual_path = self.actual_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(E2eError::Visual(format!(
                "actual screenshot not found: {}",
                actual_path.display()
            )));
        }
        let actual_hash = hash_file(&actual_path)?;

        if self.config.update_baselines || !baseline_path.exists() {
            if !self.config.update_baselines {
                return Err(E2eError::BaselineNotFound(baseline_path.display().to_string()));
            }
            std::fs::copy(&actual_path, &baseline_path)?;
            info!("Wrote baseline for '{}'", name);
            return Ok(VisualDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                baseline_hash: actual_hash.clone(),
                actual_hash,
                baseline_written: true,
            });
        }

        let baseline_hash = hash_file(&baseline_path)?;
        let actual = image::open(&actual_path)?.to_rgba8();

        if actual_hash == baseline_hash {
            debug!("'{}' matches its baseline byte for byte", name);
            return Ok(VisualDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: actual.width() as u64 * actual.height() as u64,
                diff_image_path: None,
                actual_hash,
                baseline_hash,
                baseline_written: false,
            });
        }

        let baseline = image::open(&baseline_path)?.to_rgba8();
        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "'{}' size changed: actual {:?} vs baseline {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let diff = diff_images(&actual, &baseline, self.config.pixel_tolerance);
        let diff_percent = diff.percent();
        let matches = diff_percent <= max_diff;

        let diff_image_path = if diff.diff_pixels > 0 {
            let path = self
                .config
                .diff_dir
                .join(format!("{}-diff.png", file_stem(name)));
            diff.image.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "'{}' differs from its baseline: {:.2}% of pixels (allowed {:.2}%)",
                name, diff_percent, max_diff
            );
        }

        Ok(VisualDiff {
            name: name.to_string(),
            matches,
            diff_percent,
            diff_pixels: diff.diff_pixels,
            total_pixels: diff.total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
            baseline_written: false,
        })
    }

    /// Promote the actual screenshot for `name` to baseline
    pub fn update_baseline(&self, name: &str) -> E2eResult<()> {
        let actual_path = self.actual_path(name);
        if !actual_path.exists() {
            return Err(E2eError::Visual(format!(
                "cannot update baseline: {} not found",
                actual_path.display()
            )));
        }
        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    /// Baseline names, sorted
    pub fn list_baselines(&self) -> E2eResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.baseline_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Check names become file names; keep them to a safe alphabet
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&data)))
}
