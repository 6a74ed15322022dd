//! Sync raw task-software exports from the drop folder into per-subject
//! data directories.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;

use crate::config::Config;

/// Copy every new file from the drop folder into `data/<subj>/`.
///
/// The subject id is the file-name prefix before the first `_`. Hidden
/// files are skipped, and files already present under the subject are left
/// alone, so repeated runs only pick up new exports. Returns the number of
/// files copied.
pub fn sync_drop_folder(config: &Config) -> Result<usize> {
    let entries = fs::read_dir(&config.drop_dir).with_context(|| {
        format!("Failed to list drop folder {}", config.drop_dir.display())
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }

        let subj_id = file_name.split('_').next().unwrap_or(&file_name);
        let subj_dir = config.subject_dir(subj_id);
        fs::create_dir_all(&subj_dir)
            .with_context(|| format!("Failed to create {}", subj_dir.display()))?;

        let target = subj_dir.join(&file_name);
        if target.exists() {
            debug!("already ingested: {file_name}");
            continue;
        }

        fs::copy(entry.path(), &target)
            .with_context(|| format!("Failed to copy {file_name} to {}", target.display()))?;
        info!("ingested {file_name} -> {}", target.display());
        copied += 1;
    }
    Ok(copied)
}
