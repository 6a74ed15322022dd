use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Directory that holds group-level outputs inside the data directory.
pub const GROUP_DIR_NAME: &str = "groupData";

/// Suffix appended to a stimulus file stem to form its AOI mask file name.
pub const DEFAULT_MASK_SUFFIX: &str = "_AOIs.png";

/// Run configuration: directory layout plus the AOI scale factor.
///
/// Loaded from an optional JSON file; missing fields fall back to the
/// defaults below, so a config file only needs to override what differs
/// from the standard experiment layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Per-subject data directories live directly under here.
    pub data_dir: PathBuf,
    /// Stimulus images, as referenced by the `stim` column.
    pub stimuli_dir: PathBuf,
    /// AOI mask rasters, one per stimulus that has AOI data.
    pub aoi_dir: PathBuf,
    /// Drop folder the task software exports raw files into.
    pub drop_dir: PathBuf,
    /// Suffix appended to a stimulus stem to name its mask file.
    pub mask_suffix: String,
    /// Display-pixels-to-mask-pixels ratio applied before membership tests.
    pub scale_factor: f64,
    /// Displayed stimulus size in pixels, if known. When set, every loaded
    /// mask is checked for consistency with `display * scale_factor`.
    pub display_size: Option<[u32; 2]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            stimuli_dir: PathBuf::from("stimuli"),
            aoi_dir: PathBuf::from("stimuli/AOIs"),
            drop_dir: PathBuf::from("incoming"),
            mask_suffix: DEFAULT_MASK_SUFFIX.to_string(),
            // Reference deployment: 500px masks for stimuli shown at 707px
            scale_factor: 500.0 / 707.0,
            display_size: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject configurations the pipeline must not run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(PipelineError::InvalidScaleFactor(self.scale_factor));
        }
        Ok(())
    }

    pub fn subject_dir(&self, subj_id: &str) -> PathBuf {
        self.data_dir.join(subj_id)
    }

    /// `<data>/<subj>/<subj>_output.json`, as written by the task software.
    pub fn raw_json_path(&self, subj_id: &str) -> PathBuf {
        self.subject_dir(subj_id).join(format!("{subj_id}_output.json"))
    }

    /// `<data>/<subj>/<subj>_data.tsv`, the per-subject gaze table.
    pub fn gaze_table_path(&self, subj_id: &str) -> PathBuf {
        self.subject_dir(subj_id).join(format!("{subj_id}_data.tsv"))
    }

    pub fn subject_plots_dir(&self, subj_id: &str) -> PathBuf {
        self.subject_dir(subj_id).join("plots")
    }

    pub fn group_dir(&self) -> PathBuf {
        self.data_dir.join(GROUP_DIR_NAME)
    }

    pub fn group_plots_dir(&self) -> PathBuf {
        self.group_dir().join("plots")
    }

    /// Every subject directory under the data dir, sorted by id.
    ///
    /// Anything that is not a directory, the group-data directory, and
    /// hidden entries are skipped.
    pub fn list_subjects(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.data_dir).with_context(|| {
            format!("Failed to list data directory {}", self.data_dir.display())
        })?;

        let mut subjects = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name == GROUP_DIR_NAME || name.starts_with('.') {
                continue;
            }
            subjects.push(name);
        }
        subjects.sort();
        Ok(subjects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_factor_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!((config.scale_factor - 500.0 / 707.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_scale_factor() {
        let mut config = Config::default();
        config.scale_factor = 0.0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidScaleFactor(_))
        ));

        config.scale_factor = -1.5;
        assert!(config.validate().is_err());

        config.scale_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_file_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"scaleFactor": 0.5}"#).unwrap();
        assert_eq!(config.scale_factor, 0.5);
        assert_eq!(config.mask_suffix, DEFAULT_MASK_SUFFIX);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn subject_paths_follow_layout() {
        let config = Config::default();
        assert_eq!(
            config.raw_json_path("s01"),
            PathBuf::from("data/s01/s01_output.json")
        );
        assert_eq!(
            config.gaze_table_path("s01"),
            PathBuf::from("data/s01/s01_data.tsv")
        );
        assert_eq!(config.group_dir(), PathBuf::from("data/groupData"));
    }
}
