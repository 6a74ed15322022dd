//! Tab-separated per-subject gaze tables.
//!
//! Tables are kept as raw string cells so rewriting a file preserves every
//! original column byte-for-byte; only columns explicitly replaced through
//! [`GazeTable::set_column`] change across runs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Column holding the assigned AOI label.
pub const AOI_COLUMN: &str = "AOI";

/// One gaze point extracted from a table row, typed for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    pub trial_num: i64,
    pub subj_id: String,
    pub stim: String,
}

/// A column-addressable TSV table, mutable in place.
#[derive(Debug, Clone)]
pub struct GazeTable {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl GazeTable {
    /// An empty table that will be persisted at `path`.
    pub fn new(path: PathBuf, columns: Vec<String>) -> Self {
        Self {
            path,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Parse TSV `contents`; `path` is used for diagnostics and later writes.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, PipelineError> {
        let mut lines = contents.lines();
        let header = lines.next().ok_or_else(|| PipelineError::Table {
            path: path.to_path_buf(),
            line: 1,
            message: "empty file, expected a header row".to_string(),
        })?;
        let columns: Vec<String> = header.split('\t').map(str::to_string).collect();

        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let cells: Vec<String> = line.split('\t').map(str::to_string).collect();
            if cells.len() != columns.len() {
                return Err(PipelineError::Table {
                    path: path.to_path_buf(),
                    line: idx + 2,
                    message: format!(
                        "expected {} columns, found {}",
                        columns.len(),
                        cells.len()
                    ),
                });
            }
            rows.push(cells);
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        debug_assert_eq!(cells.len(), self.columns.len());
        self.rows.push(cells);
    }

    /// Append every row of `other`; column sets must agree.
    pub fn extend_from(&mut self, other: &GazeTable) -> Result<(), PipelineError> {
        if other.columns != self.columns {
            return Err(PipelineError::Table {
                path: other.path.clone(),
                line: 1,
                message: format!(
                    "column mismatch: expected [{}], found [{}]",
                    self.columns.join(", "),
                    other.columns.join(", ")
                ),
            });
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, PipelineError> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                path: self.path.clone(),
                name: name.to_string(),
            })
    }

    /// Replace the named column, or append it as the last column.
    ///
    /// `values` must hold one entry per row. Replacing makes relabeling
    /// idempotent: rerunning assignment overwrites the previous labels.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        assert_eq!(values.len(), self.rows.len(), "one value per row");
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Extract typed gaze samples, one per row in row order.
    pub fn samples(&self) -> Result<Vec<GazeSample>, PipelineError> {
        let x_idx = self.require_column("x")?;
        let y_idx = self.require_column("y")?;
        let trial_idx = self.require_column("trialNum")?;
        let subj_idx = self.require_column("subjID")?;
        let stim_idx = self.require_column("stim")?;

        let mut samples = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            let line = idx + 2;
            samples.push(GazeSample {
                x: self.parse_f64(&row[x_idx], line, "x")?,
                y: self.parse_f64(&row[y_idx], line, "y")?,
                trial_num: self.parse_i64(&row[trial_idx], line, "trialNum")?,
                subj_id: row[subj_idx].clone(),
                stim: row[stim_idx].clone(),
            });
        }
        Ok(samples)
    }

    /// Persist at the table's own path, atomically: the file is fully
    /// written to a temp sibling and renamed over the target, so a subject
    /// table is never left partially written.
    pub fn write(&self) -> Result<(), PipelineError> {
        let mut out = String::new();
        out.push_str(&self.columns.join("\t"));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }

        let tmp = self.path.with_extension("tsv.tmp");
        let io_err = |source| PipelineError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, out).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn parse_f64(&self, cell: &str, line: usize, column: &str) -> Result<f64, PipelineError> {
        cell.trim().parse().map_err(|_| PipelineError::Table {
            path: self.path.clone(),
            line,
            message: format!("invalid {column} value '{cell}'"),
        })
    }

    fn parse_i64(&self, cell: &str, line: usize, column: &str) -> Result<i64, PipelineError> {
        let trimmed = cell.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Ok(value);
        }
        // Tables that round-tripped through float formatting carry "3.0"
        match trimmed.parse::<f64>() {
            Ok(value) if value.fract() == 0.0 => Ok(value as i64),
            _ => Err(PipelineError::Table {
                path: self.path.clone(),
                line,
                message: format!("invalid {column} value '{cell}'"),
            }),
        }
    }
}
