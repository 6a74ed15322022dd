//! Raw gaze trace plots: one image per trial, samples drawn over the
//! faded stimulus in recording order.

use anyhow::{anyhow, Context, Result};
use log::info;
use plotters::prelude::*;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::plot::colormap;
use crate::raw::{RawSession, RawTrial};

/// Surviving share of the stimulus image under the trace.
const STIM_ALPHA: f32 = 0.5;
/// Dot radius approximating the reference scatter size.
const SAMPLE_RADIUS: i32 = 9;
const DASH_ON: i32 = 12;
const DASH_OFF: i32 = 8;

/// Render every trial of a subject into `<data>/<subj>/plots/trial<N>.png`.
/// Returns the number of trials plotted.
pub fn plot_subject(config: &Config, subj_id: &str) -> Result<usize> {
    let session = RawSession::load(&config.raw_json_path(subj_id))?;

    let plot_dir = config.subject_plots_dir(subj_id);
    fs::create_dir_all(&plot_dir)
        .with_context(|| format!("Failed to create {}", plot_dir.display()))?;

    for trial in &session.task_data {
        plot_trial(config, trial, &plot_dir)?;
        info!("plot: trial {} for subj {subj_id}", trial.trial_num);
    }
    Ok(session.trial_count())
}

fn plot_trial(config: &Config, trial: &RawTrial, plot_dir: &Path) -> Result<()> {
    let stim = super::load_faded_stimulus(&config.stimuli_dir, &trial.stim_name, STIM_ALPHA)?;
    let (width, height) = stim.dimensions();
    let mut buffer = stim.into_raw();

    let points = trial.gaze_points();
    let pixels: Vec<(i32, i32)> = points
        .iter()
        .map(|&(x, y)| (x.round() as i32, y.round() as i32))
        .collect();

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();

        // Connecting trace under the sample dots
        if pixels.len() > 1 {
            root.draw(&PathElement::new(pixels.clone(), RGBAColor(0, 0, 0, 0.5)))
                .map_err(to_draw_err)?;
        }

        // Samples colored by recording order, early pale to late dark
        let n = pixels.len();
        for (idx, &(x, y)) in pixels.iter().enumerate() {
            let t = if n > 1 { idx as f64 / (n - 1) as f64 } else { 0.0 };
            let [r, g, b] = colormap::rd_pu(t);
            root.draw(&Circle::new((x, y), SAMPLE_RADIUS, RGBColor(r, g, b).filled()))
                .map_err(to_draw_err)?;
        }

        // Fixation cross location, dashed
        let (fix_x, fix_y) = trial.fix_point();
        let (fix_x, fix_y) = (fix_x.round() as i32, fix_y.round() as i32);
        let orange = RGBColor(255, 165, 0).stroke_width(2);
        let mut x = 0;
        while x < width as i32 {
            let end = (x + DASH_ON).min(width as i32);
            root.draw(&PathElement::new(vec![(x, fix_y), (end, fix_y)], orange))
                .map_err(to_draw_err)?;
            x = end + DASH_OFF;
        }
        let mut y = 0;
        while y < height as i32 {
            let end = (y + DASH_ON).min(height as i32);
            root.draw(&PathElement::new(vec![(fix_x, y), (fix_x, end)], orange))
                .map_err(to_draw_err)?;
            y = end + DASH_OFF;
        }

        root.present().map_err(to_draw_err)?;
    }

    let out_path = plot_dir.join(format!("trial{}.png", trial.trial_num));
    image::save_buffer(
        &out_path,
        &buffer,
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )
    .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(())
}

/// Flatten a backend drawing error for `?` at call sites.
fn to_draw_err(err: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("failed to draw plot element: {err}")
}
