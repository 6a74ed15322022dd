//! Group-level aggregation of per-subject data files.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::raw::RawSession;
use crate::table::GazeTable;

/// Combined raw gaze points for every subject, straight from the JSON.
pub const ALL_SUBJS_RAW: &str = "allSubjsRaw.tsv";

/// Combined labeled gaze tables for every subject.
pub const ALL_SUBJS_LABELED: &str = "allSubjs_cursorTracking.tsv";

/// Merge every subject's raw session into `groupData/allSubjsRaw.tsv`
/// (columns x, y, subjID, stim). Subjects without a raw JSON are skipped
/// with a warning. Returns the output path and how many subjects went in.
pub fn combine_raw(config: &Config) -> Result<(PathBuf, usize)> {
    let output = group_output_path(config, ALL_SUBJS_RAW)?;
    let columns = ["x", "y", "subjID", "stim"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let mut combined = GazeTable::new(output.clone(), columns);

    let mut included = 0;
    for subj_id in config.list_subjects()? {
        let json_path = config.raw_json_path(&subj_id);
        if !json_path.exists() {
            warn!("subject {subj_id} has no raw session file, skipping");
            continue;
        }
        info!("reading subject {subj_id}");
        let session = RawSession::load(&json_path)?;

        for trial in &session.task_data {
            for (x, y) in trial.gaze_points() {
                combined.push_row(vec![
                    format!("{x}"),
                    format!("{y}"),
                    subj_id.clone(),
                    trial.stim_name.clone(),
                ]);
            }
        }
        included += 1;
    }

    if included == 0 {
        bail!("no raw session files found under {}", config.data_dir.display());
    }
    combined.write()?;
    info!(
        "combined raw data for {included} subjects -> {} ({} rows)",
        output.display(),
        combined.len()
    );
    Ok((output, included))
}

/// Merge every subject's labeled gaze table into
/// `groupData/allSubjs_cursorTracking.tsv`. All tables must share the same
/// column layout; rows keep per-subject order, subjects in sorted order.
pub fn combine_labeled(config: &Config) -> Result<(PathBuf, usize)> {
    let output = group_output_path(config, ALL_SUBJS_LABELED)?;

    let mut combined: Option<GazeTable> = None;
    let mut included = 0;
    for subj_id in config.list_subjects()? {
        let table_path = config.gaze_table_path(&subj_id);
        if !table_path.exists() {
            warn!("subject {subj_id} has no gaze table, skipping");
            continue;
        }
        info!("adding subject {subj_id}");
        let table = GazeTable::read(&table_path)?;

        match &mut combined {
            None => {
                let mut first =
                    GazeTable::new(output.clone(), table.columns().to_vec());
                first.extend_from(&table)?;
                combined = Some(first);
            }
            Some(accumulated) => accumulated.extend_from(&table)?,
        }
        included += 1;
    }

    let Some(combined) = combined else {
        bail!("no gaze tables found under {}", config.data_dir.display());
    };
    combined.write()?;
    info!(
        "combined tables for {included} subjects -> {} ({} rows)",
        output.display(),
        combined.len()
    );
    Ok((output, included))
}

fn group_output_path(config: &Config, file_name: &str) -> Result<PathBuf> {
    let group_dir = config.group_dir();
    fs::create_dir_all(&group_dir)
        .with_context(|| format!("Failed to create {}", group_dir.display()))?;
    Ok(group_dir.join(file_name))
}
