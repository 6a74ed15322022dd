//! Per-trial and per-subject AOI label assignment.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::GrayImage;
use log::{info, warn};

use crate::aoi::mask::{AoiLabel, AoiMask};
use crate::config::Config;
use crate::error::PipelineError;
use crate::table::{GazeSample, GazeTable, AOI_COLUMN};

/// Counts for one labeled subject, reported by the batch driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectStats {
    pub trials: usize,
    pub missing_trials: usize,
    pub samples: usize,
}

/// Resolves AOI masks for stimuli and labels gaze samples against them.
///
/// Masks are cached by stimulus name for the lifetime of the assigner, so
/// a batch run decodes each mask raster once no matter how many trials or
/// subjects used the stimulus.
pub struct AoiAssigner {
    aoi_dir: PathBuf,
    mask_suffix: String,
    scale_factor: f64,
    display_size: Option<[u32; 2]>,
    masks: HashMap<String, AoiMask>,
}

impl AoiAssigner {
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            aoi_dir: config.aoi_dir.clone(),
            mask_suffix: config.mask_suffix.clone(),
            scale_factor: config.scale_factor,
            display_size: config.display_size,
            masks: HashMap::new(),
        })
    }

    /// Expected mask path for a stimulus: file name component, extension
    /// stripped, suffix appended, resolved against the AOI directory.
    ///
    /// `faces/face01.jpg` -> `<aoi_dir>/face01_AOIs.png`.
    pub fn mask_path(&self, stim: &str) -> PathBuf {
        let stem = Path::new(stim)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        self.aoi_dir.join(format!("{stem}{}", self.mask_suffix))
    }

    /// Label every sample of one trial against its stimulus's mask.
    ///
    /// All samples are expected to share `stim`. If no mask file exists the
    /// whole trial is labeled [`AoiLabel::Missing`] and a diagnostic names
    /// the subject, trial, and stimulus; a mask that exists but cannot be
    /// decoded is a fatal error.
    pub fn label_trial(
        &mut self,
        samples: &[GazeSample],
        stim: &str,
    ) -> Result<Vec<AoiLabel>, PipelineError> {
        if !self.masks.contains_key(stim) {
            let path = self.mask_path(stim);
            if !path.exists() {
                if let Some(first) = samples.first() {
                    warn!(
                        "no AOI mask for stimulus {stim} (subject {}, trial {}): \
                         labeling trial as missing",
                        first.subj_id, first.trial_num
                    );
                } else {
                    warn!("no AOI mask for stimulus {stim}: labeling trial as missing");
                }
                return Ok(vec![AoiLabel::Missing; samples.len()]);
            }
            let mask = self.load_mask(&path)?;
            self.masks.insert(stim.to_string(), mask);
        }

        let mask = &self.masks[stim];
        Ok(samples
            .iter()
            .map(|sample| mask.classify(sample.x, sample.y))
            .collect())
    }

    /// Label a whole subject table in place.
    ///
    /// Rows are grouped by trial number and trials processed in ascending
    /// order; each label lands back on its originating row, so row order
    /// and every original cell are preserved. The `AOI` column is replaced
    /// if present, making reruns idempotent.
    pub fn label_subject(&mut self, table: &mut GazeTable) -> Result<SubjectStats, PipelineError> {
        let samples = table.samples()?;

        let mut trial_rows: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, sample) in samples.iter().enumerate() {
            trial_rows.entry(sample.trial_num).or_default().push(row);
        }

        let mut stats = SubjectStats {
            trials: trial_rows.len(),
            samples: samples.len(),
            ..Default::default()
        };

        let mut labels = vec![AoiLabel::None; samples.len()];
        for rows in trial_rows.values() {
            let trial_samples: Vec<GazeSample> =
                rows.iter().map(|&row| samples[row].clone()).collect();
            let stim = trial_samples[0].stim.clone();
            let trial_labels = self.label_trial(&trial_samples, &stim)?;

            if trial_labels.first() == Some(&AoiLabel::Missing) {
                stats.missing_trials += 1;
            }
            for (&row, label) in rows.iter().zip(trial_labels) {
                labels[row] = label;
            }
        }

        table.set_column(
            AOI_COLUMN,
            labels.iter().map(|l| l.as_tsv_field().to_string()).collect(),
        );
        Ok(stats)
    }

    fn load_mask(&self, path: &Path) -> Result<AoiMask, PipelineError> {
        let image = image::open(path).map_err(|source| PipelineError::MaskLoad {
            path: path.to_path_buf(),
            source,
        })?;
        // Mask files are stored with redundant channels; only one carries
        // the region codes
        let raster: GrayImage = image.to_luma8();

        self.check_display_consistency(path, &raster)?;

        let mask = AoiMask::from_image(&raster, self.scale_factor);
        info!(
            "loaded AOI mask {} ({} regions)",
            path.display(),
            mask.region_count()
        );
        Ok(mask)
    }

    /// When the displayed stimulus size is configured, the mask's pixel
    /// grid must agree with `display * scale_factor` (within a pixel of
    /// rounding); a mismatch means the configured scale factor does not
    /// describe this mask and every label it produced would be wrong.
    fn check_display_consistency(
        &self,
        path: &Path,
        raster: &GrayImage,
    ) -> Result<(), PipelineError> {
        let Some([display_w, display_h]) = self.display_size else {
            return Ok(());
        };
        let expected_w = (display_w as f64 * self.scale_factor).round() as u32;
        let expected_h = (display_h as f64 * self.scale_factor).round() as u32;
        let (actual_w, actual_h) = raster.dimensions();

        if actual_w.abs_diff(expected_w) > 1 || actual_h.abs_diff(expected_h) > 1 {
            return Err(PipelineError::ScaleMismatch {
                mask: path.to_path_buf(),
                scale: self.scale_factor,
                expected_w,
                expected_h,
                actual_w,
                actual_h,
            });
        }
        Ok(())
    }
}
