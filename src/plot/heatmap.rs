//! Gaze density heatmaps: one image per stimulus, aggregated over every
//! subject in the combined raw table.
//!
//! Density is a Gaussian kernel estimate evaluated on a coarse cell grid
//! (histogram binning plus separable blur, Scott's-rule bandwidth),
//! quantized into discrete levels like a contour fill. The lowest level is
//! left transparent so sparsely-visited areas keep the stimulus visible.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::plot::colormap;
use crate::table::GazeTable;

const HEAT_LEVELS: usize = 11;
/// Density cell edge in stimulus pixels.
const CELL_SIZE: u32 = 4;
const STIM_ALPHA: f32 = 0.6;
const HEAT_ALPHA: f64 = 0.7;

struct StimGaze {
    points: Vec<(f64, f64)>,
    subjects: HashSet<String>,
}

/// Render a heatmap for every distinct stimulus in `datafile` (the
/// combined raw table) into the group plots directory. Returns how many
/// heatmaps were written; stimuli whose image cannot be rendered are
/// skipped with a warning.
pub fn heatmaps_for_group(config: &Config, datafile: &Path) -> Result<usize> {
    let table = GazeTable::read(datafile)?;
    let x_idx = table.column_index("x").context("datafile has no 'x' column")?;
    let y_idx = table.column_index("y").context("datafile has no 'y' column")?;
    let stim_idx = table
        .column_index("stim")
        .context("datafile has no 'stim' column")?;
    let subj_idx = table
        .column_index("subjID")
        .context("datafile has no 'subjID' column")?;

    let mut groups: BTreeMap<String, StimGaze> = BTreeMap::new();
    for row in table.rows() {
        let (Ok(x), Ok(y)) = (row[x_idx].parse::<f64>(), row[y_idx].parse::<f64>()) else {
            warn!("skipping unparseable gaze row in {}", datafile.display());
            continue;
        };
        let entry = groups.entry(row[stim_idx].clone()).or_insert_with(|| StimGaze {
            points: Vec::new(),
            subjects: HashSet::new(),
        });
        entry.points.push((x, y));
        entry.subjects.insert(row[subj_idx].clone());
    }

    let out_dir = config.group_plots_dir();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let total = groups.len();
    let mut rendered = 0;
    for (stim, gaze) in &groups {
        match render_heatmap(config, stim, &gaze.points, &out_dir) {
            Ok(_) => {
                info!(
                    "heatmap created for image: {} ({} subjects, {} samples)",
                    Path::new(stim)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| stim.clone()),
                    gaze.subjects.len(),
                    gaze.points.len()
                );
                rendered += 1;
            }
            Err(err) => warn!("skipping heatmap for {stim}: {err:#}"),
        }
    }

    if rendered == 0 && total > 0 {
        bail!("no heatmaps could be rendered from {}", datafile.display());
    }
    Ok(rendered)
}

fn render_heatmap(
    config: &Config,
    stim: &str,
    points: &[(f64, f64)],
    out_dir: &Path,
) -> Result<PathBuf> {
    let mut image = super::load_faded_stimulus(&config.stimuli_dir, stim, STIM_ALPHA)?;
    let (width, height) = image.dimensions();

    if let Some(density) = DensityGrid::estimate(points, width, height) {
        for (px, py, pixel) in image.enumerate_pixels_mut() {
            let level = density.level_at_pixel(px, py);
            // Level 0 stays transparent, like a contour fill with the
            // lowest band dropped
            if level == 0 {
                continue;
            }
            let t = level as f64 / (HEAT_LEVELS - 1) as f64;
            let heat = colormap::viridis(t);
            for (channel, &target) in pixel.0.iter_mut().zip(&heat) {
                *channel = (*channel as f64 * (1.0 - HEAT_ALPHA) + target as f64 * HEAT_ALPHA)
                    .round() as u8;
            }
        }
    }

    let out_path = out_dir.join(super::plot_file_name(stim));
    image
        .save(&out_path)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(out_path)
}

/// Normalized gaze density over a coarse cell grid.
struct DensityGrid {
    grid_w: usize,
    values: Vec<f64>,
}

impl DensityGrid {
    /// None when no point falls inside the stimulus bounds.
    fn estimate(points: &[(f64, f64)], width: u32, height: u32) -> Option<DensityGrid> {
        let grid_w = (width as usize).div_ceil(CELL_SIZE as usize);
        let grid_h = (height as usize).div_ceil(CELL_SIZE as usize);

        let mut counts = vec![0.0f64; grid_w * grid_h];
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for &(x, y) in points {
            if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 {
                continue;
            }
            let cx = (x / CELL_SIZE as f64) as usize;
            let cy = (y / CELL_SIZE as f64) as usize;
            counts[cy * grid_w + cx] += 1.0;
            xs.push(x);
            ys.push(y);
        }
        if xs.is_empty() {
            return None;
        }

        // Scott's rule per axis, converted into cell units; floor of one
        // cell keeps degenerate clusters visible
        let scott = (xs.len() as f64).powf(-1.0 / 6.0);
        let sigma_x = (scott * std_dev(&xs) / CELL_SIZE as f64).max(1.0);
        let sigma_y = (scott * std_dev(&ys) / CELL_SIZE as f64).max(1.0);

        let blurred_rows = blur_rows(&counts, grid_w, grid_h, sigma_x);
        let mut values = blur_cols(&blurred_rows, grid_w, grid_h, sigma_y);

        let max = values.iter().cloned().fold(0.0f64, f64::max);
        if max <= 0.0 {
            return None;
        }
        for value in &mut values {
            *value /= max;
        }
        Some(DensityGrid { grid_w, values })
    }

    /// Discrete heat level for a stimulus pixel, 0..HEAT_LEVELS.
    fn level_at_pixel(&self, px: u32, py: u32) -> usize {
        let cx = (px / CELL_SIZE) as usize;
        let cy = (py / CELL_SIZE) as usize;
        let density = self.values[cy * self.grid_w + cx];
        ((density * HEAT_LEVELS as f64) as usize).min(HEAT_LEVELS - 1)
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as i64;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|d| (-((d * d) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    for weight in &mut weights {
        *weight /= total;
    }
    weights
}

fn blur_rows(values: &[f64], grid_w: usize, grid_h: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let mut out = vec![0.0; values.len()];
    for row in 0..grid_h {
        for col in 0..grid_w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let src = col as i64 + k as i64 - radius;
                if (0..grid_w as i64).contains(&src) {
                    acc += weight * values[row * grid_w + src as usize];
                }
            }
            out[row * grid_w + col] = acc;
        }
    }
    out
}

fn blur_cols(values: &[f64], grid_w: usize, grid_h: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let mut out = vec![0.0; values.len()];
    for row in 0..grid_h {
        for col in 0..grid_w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let src = row as i64 + k as i64 - radius;
                if (0..grid_h as i64).contains(&src) {
                    acc += weight * values[src as usize * grid_w + col];
                }
            }
            out[row * grid_w + col] = acc;
        }
    }
    out
}
