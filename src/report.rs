//! Per-subject outcomes for batch runs.
//!
//! Batch commands keep going when one subject fails, but every failure is
//! captured and reported at the end of the run instead of being dropped.

use chrono::{DateTime, Utc};
use log::{error, info};

/// What happened to one subject during a batch command.
#[derive(Debug, Clone)]
pub struct SubjectOutcome {
    pub subj_id: String,
    pub result: Result<String, String>,
}

impl SubjectOutcome {
    pub fn completed(subj_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            subj_id: subj_id.into(),
            result: Ok(detail.into()),
        }
    }

    pub fn failed(subj_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subj_id: subj_id.into(),
            result: Err(reason.into()),
        }
    }
}

/// Accumulated outcomes for one batch command.
#[derive(Debug)]
pub struct RunReport {
    task: &'static str,
    started_at: DateTime<Utc>,
    outcomes: Vec<SubjectOutcome>,
}

impl RunReport {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: SubjectOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Log the per-subject outcomes and a closing summary line.
    /// Returns true when every subject completed.
    pub fn log_summary(&self) -> bool {
        let completed = self.outcomes.len() - self.failed_count();
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(detail) => info!("{}: subject {} ok: {detail}", self.task, outcome.subj_id),
                Err(reason) => {
                    error!("{}: subject {} FAILED: {reason}", self.task, outcome.subj_id)
                }
            }
        }
        info!(
            "{}: {completed}/{} subjects completed in {}s",
            self.task,
            self.outcomes.len(),
            (Utc::now() - self.started_at).num_seconds()
        );
        self.failed_count() == 0
    }
}
