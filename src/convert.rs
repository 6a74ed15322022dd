//! Convert a subject's raw session JSON into the per-subject gaze table.

use anyhow::{bail, Result};
use log::info;

use crate::config::Config;
use crate::raw::RawSession;
use crate::table::GazeTable;

/// Column layout of the per-subject gaze table.
pub const GAZE_COLUMNS: [&str; 6] = ["ts", "x", "y", "subjID", "stim", "trialNum"];

/// Build `<subj>_data.tsv` from `<subj>_output.json`.
///
/// One row per gaze sample, trials in recorded order, coordinates already
/// translated relative to the stimulus origin. Returns the number of rows
/// written.
pub fn convert_subject(config: &Config, subj_id: &str) -> Result<usize> {
    let session = RawSession::load(&config.raw_json_path(subj_id))?;

    let columns = GAZE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut table = GazeTable::new(config.gaze_table_path(subj_id), columns);

    for trial in &session.task_data {
        let points = trial.gaze_points();
        let ts = &trial.img_gaze.ts;
        if ts.len() != points.len() {
            bail!(
                "subject {subj_id} trial {}: {} gaze points but {} timestamps",
                trial.trial_num,
                points.len(),
                ts.len()
            );
        }

        for (&ts, (x, y)) in ts.iter().zip(points) {
            table.push_row(vec![
                ts.to_string(),
                fmt_coord(x),
                fmt_coord(y),
                subj_id.to_string(),
                trial.stim_name.clone(),
                trial.trial_num.to_string(),
            ]);
        }
    }

    table.write()?;
    info!(
        "converted subject {subj_id}: {} trials, {} samples",
        session.trial_count(),
        table.len()
    );
    Ok(table.len())
}

fn fmt_coord(value: f64) -> String {
    format!("{value}")
}
