//! Screenshot comparison against the baseline store
//!
//! A pixel counts as differing when the sum of absolute RGB channel deltas
//! exceeds a small tolerance, which absorbs anti-aliasing and compression
//! noise. The diff score is the differing-pixel fraction in `0.0..=1.0`; a
//! case fails when the score reaches the configured threshold. Missing or
//! undecodable baselines are never failures: the capture is recorded as the
//! new baseline for future runs.

use std::path::{Path, PathBuf};

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::ComparisonError;

/// Per-pixel tolerance: sum of absolute RGB deltas that still counts as
/// "the same pixel"
const CHANNEL_SUM_TOLERANCE: u32 = 30;

/// Result of diffing one capture against its comparison source
#[derive(Debug, Clone)]
pub struct VisualDiff {
    /// Differing-pixel fraction, `0.0..=1.0`
    pub diff_score: f64,

    /// Number of differing pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Diff image path, present when any pixel differed
    pub diff_image: Option<PathBuf>,

    /// SHA-256 of the capture file
    pub actual_hash: String,

    /// SHA-256 of the comparison source file
    pub baseline_hash: String,
}

/// Verdict for one check case
#[derive(Debug, Clone)]
pub enum Comparison {
    /// Diff score below threshold
    Pass(VisualDiff),

    /// Diff score at or above threshold
    Fail(VisualDiff),

    /// No usable baseline existed; the capture became the new baseline
    NewBaseline { baseline: PathBuf },
}

/// Compares captures against the baseline store and writes diff images
pub struct VisualTester {
    baseline_dir: PathBuf,
    diff_dir: PathBuf,
    threshold: f64,
    update_baselines: bool,
}

impl VisualTester {
    pub fn new(
        baseline_dir: PathBuf,
        diff_dir: PathBuf,
        threshold: f64,
        update_baselines: bool,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&baseline_dir)?;
        std::fs::create_dir_all(&diff_dir)?;
        Ok(Self {
            baseline_dir,
            diff_dir,
            threshold,
            update_baselines,
        })
    }

    /// Baseline location for a case: `<baseline_dir>/<page-key>/<viewport>.png`
    pub fn baseline_path(&self, page_key: &str, viewport_name: &str) -> PathBuf {
        self.baseline_dir
            .join(page_key)
            .join(format!("{viewport_name}.png"))
    }

    /// Compare a capture against the stored baseline for its case
    pub fn compare_against_baseline(
        &self,
        page_key: &str,
        viewport_name: &str,
        actual: &Path,
    ) -> Result<Comparison, ComparisonError> {
        if !actual.exists() {
            return Err(ComparisonError::ActualMissing(actual.to_path_buf()));
        }

        let baseline = self.baseline_path(page_key, viewport_name);

        if self.update_baselines {
            info!("Updating baseline for {page_key}@{viewport_name}");
            return self.record_baseline(actual, &baseline);
        }

        if !baseline.exists() {
            info!("No baseline for {page_key}@{viewport_name} - recording capture as baseline");
            return self.record_baseline(actual, &baseline);
        }

        let baseline_img = match image::open(&baseline) {
            Ok(img) => img,
            Err(e) => {
                // A corrupt baseline is re-recorded, never a failure
                warn!(
                    "Baseline {} is unreadable ({e}) - re-recording from capture",
                    baseline.display()
                );
                return self.record_baseline(actual, &baseline);
            }
        };

        let key = format!("{page_key}@{viewport_name}");
        let diff = self.diff_files(&key, &baseline, baseline_img, actual)?;
        Ok(self.verdict(diff))
    }

    /// Compare a capture against a reference capture of the same route
    /// (reference-URL mode; the baseline store is not consulted)
    pub fn compare_against_reference(
        &self,
        key: &str,
        reference: &Path,
        actual: &Path,
    ) -> Result<Comparison, ComparisonError> {
        if !actual.exists() {
            return Err(ComparisonError::ActualMissing(actual.to_path_buf()));
        }
        if !reference.exists() {
            return Err(ComparisonError::BaselineMissing(reference.to_path_buf()));
        }
        let reference_img =
            image::open(reference).map_err(|e| ComparisonError::BaselineCorrupt {
                path: reference.to_path_buf(),
                detail: e.to_string(),
            })?;
        let diff = self.diff_files(key, reference, reference_img, actual)?;
        Ok(self.verdict(diff))
    }

    fn verdict(&self, diff: VisualDiff) -> Comparison {
        if diff.diff_score >= self.threshold {
            warn!(
                "Visual regression: {:.4} of pixels differ (threshold {:.4})",
                diff.diff_score, self.threshold
            );
            Comparison::Fail(diff)
        } else {
            Comparison::Pass(diff)
        }
    }

    /// Install the capture as the baseline for its case
    fn record_baseline(
        &self,
        actual: &Path,
        baseline: &Path,
    ) -> Result<Comparison, ComparisonError> {
        if let Some(parent) = baseline.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(actual, baseline)?;
        Ok(Comparison::NewBaseline {
            baseline: baseline.to_path_buf(),
        })
    }

    /// Pixel-level diff between a decoded comparison source and the capture
    /// on disk, writing a diff image when anything differs
    fn diff_files(
        &self,
        key: &str,
        source_path: &Path,
        source_img: DynamicImage,
        actual: &Path,
    ) -> Result<VisualDiff, ComparisonError> {
        let baseline_hash = hash_file(source_path)?;
        let actual_hash = hash_file(actual)?;

        // Identical bytes need no decode of the capture
        if baseline_hash == actual_hash {
            debug!("{key}: screenshots match exactly (same hash)");
            let (width, height) = (source_img.width(), source_img.height());
            return Ok(VisualDiff {
                diff_score: 0.0,
                diff_pixels: 0,
                total_pixels: u64::from(width) * u64::from(height),
                diff_image: None,
                actual_hash,
                baseline_hash,
            });
        }

        let actual_img = image::open(actual)?;
        let source_rgba = source_img.to_rgba8();
        let mut actual_rgba = actual_img.to_rgba8();

        let (width, height) = source_rgba.dimensions();
        if actual_rgba.dimensions() != (width, height) {
            warn!(
                "{key}: dimensions differ (baseline {:?}, actual {:?}) - resizing actual",
                (width, height),
                actual_rgba.dimensions()
            );
            actual_rgba = imageops::resize(&actual_rgba, width, height, FilterType::Lanczos3);
        }

        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;
        let total_pixels = u64::from(width) * u64::from(height);

        for y in 0..height {
            for x in 0..width {
                let source_pixel = source_rgba.get_pixel(x, y);
                let actual_pixel = actual_rgba.get_pixel(x, y);

                if pixels_differ(source_pixel, actual_pixel) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                } else {
                    // Dim matching pixels so differences stand out
                    let [r, g, b, _] = actual_pixel.0;
                    diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
                }
            }
        }

        let diff_score = diff_pixels as f64 / total_pixels as f64;

        let diff_image = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{key}.png"));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        Ok(VisualDiff {
            diff_score,
            diff_pixels,
            total_pixels,
            diff_image,
            actual_hash,
            baseline_hash,
        })
    }

    /// Enumerate stored baselines as (page-key, viewport) pairs
    pub fn list_baselines(&self) -> Result<Vec<(String, String)>, ComparisonError> {
        let mut baselines = Vec::new();
        for entry in walkdir::WalkDir::new(&self.baseline_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().map(|ext| ext == "png").unwrap_or(false) {
                let viewport = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string());
                let page = path
                    .parent()
                    .and_then(|dir| dir.file_name())
                    .map(|name| name.to_string_lossy().to_string());
                if let (Some(page), Some(viewport)) = (page, viewport) {
                    baselines.push((page, viewport));
                }
            }
        }
        baselines.sort();
        Ok(baselines)
    }
}

/// Channel-tolerant pixel equality
fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    let delta: u32 = a.0[..3]
        .iter()
        .zip(&b.0[..3])
        .map(|(x, y)| u32::from(x.abs_diff(*y)))
        .sum();
    delta > CHANNEL_SUM_TOLERANCE
}

/// SHA-256 of a file's contents, hex encoded
fn hash_file(path: &Path) -> Result<String, ComparisonError> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
