use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline conditions. Missing mask files and unrecognized region
/// codes are deliberately not represented here: both are non-fatal and
/// surface as warn-level diagnostics instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("scale factor must be positive and finite, got {0}")]
    InvalidScaleFactor(f64),

    #[error(
        "mask {} is {actual_w}x{actual_h}, but the configured display size \
         at scale {scale} implies {expected_w}x{expected_h}",
        mask.display()
    )]
    ScaleMismatch {
        mask: PathBuf,
        scale: f64,
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("failed to decode AOI mask {}", path.display())]
    MaskLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: line {line}: {message}", path.display())]
    Table {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("gaze table {} has no '{name}' column", path.display())]
    MissingColumn { path: PathBuf, name: String },

    #[error("failed to parse session data {}", path.display())]
    RawData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
