//! Diagnostic plot rendering: per-trial raw traces and per-stimulus
//! density heatmaps, plus the heatmap gallery manifest.

pub mod colormap;
pub mod heatmap;
pub mod raw;

use anyhow::{Context, Result};
use image::RgbImage;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Load a stimulus image and fade it toward white so overlays stay
/// readable; `alpha` is the surviving share of the original image.
fn load_faded_stimulus(stimuli_dir: &Path, stim: &str, alpha: f32) -> Result<RgbImage> {
    let path = stimuli_dir.join(stim);
    let mut image = image::open(&path)
        .with_context(|| format!("Failed to load stimulus {}", path.display()))?
        .to_rgb8();

    for pixel in image.pixels_mut() {
        for channel in &mut pixel.0 {
            *channel = (*channel as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        }
    }
    Ok(image)
}

/// Write the heatmap gallery manifest: one `<img>` line per heatmap file,
/// sorted by name, hidden files skipped. Returns the number of entries.
pub fn write_gallery(plots_dir: &Path, output: &Path) -> Result<usize> {
    let entries = fs::read_dir(plots_dir)
        .with_context(|| format!("Failed to list plot directory {}", plots_dir.display()))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();

    let mut contents = String::new();
    for name in &names {
        contents.push_str(&format!("<img src=\"images/heatmaps/{name}\">\n"));
    }
    fs::write(output, contents)
        .with_context(|| format!("Failed to write gallery manifest {}", output.display()))?;

    info!("gallery manifest: {} entries -> {}", names.len(), output.display());
    Ok(names.len())
}

/// Output file name for a stimulus-derived plot: stimulus stem + `.png`.
fn plot_file_name(stim: &str) -> PathBuf {
    let stem = Path::new(stim)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "plot".to_string());
    PathBuf::from(format!("{stem}.png"))
}
