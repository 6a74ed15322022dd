//! Serde model of the task software's raw session export
//! (`<subj>_output.json`) and translation of gaze points into
//! stimulus-relative coordinates.

use serde::{de, Deserialize, Deserializer};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// One exported session: every trial the subject completed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSession {
    #[serde(rename = "taskData")]
    pub task_data: Vec<RawTrial>,
}

/// A single trial as recorded by the task software.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrial {
    #[serde(rename = "trialNum")]
    pub trial_num: i64,
    #[serde(rename = "stimName")]
    pub stim_name: String,
    /// Stimulus image origin on the canvas, (x, y).
    #[serde(rename = "imgOrigin")]
    pub img_origin: [Scalar; 2],
    /// Fixation cross location on the canvas, (x, y).
    #[serde(rename = "fixLocation")]
    pub fix_location: [Scalar; 2],
    #[serde(rename = "imgGaze")]
    pub img_gaze: GazeTrack,
}

/// Index-aligned gaze vectors for one trial.
#[derive(Debug, Clone, Deserialize)]
pub struct GazeTrack {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub ts: Vec<i64>,
}

/// Canvas scalar. The task software is inconsistent about whether origin
/// and fixation components arrive as numbers or numeric strings; both
/// forms parse, anything else fails the session load.
#[derive(Debug, Clone, Copy)]
pub struct Scalar(pub f64);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(value) => Ok(Scalar(value)),
            Raw::Text(text) => text
                .trim()
                .parse()
                .map(Scalar)
                .map_err(|_| de::Error::custom(format!("invalid numeric string '{text}'"))),
        }
    }
}

impl RawSession {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| PipelineError::RawData {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn trial_count(&self) -> usize {
        self.task_data.len()
    }
}

impl RawTrial {
    /// Gaze points translated to be relative to the stimulus image origin
    /// instead of the canvas.
    pub fn gaze_points(&self) -> Vec<(f64, f64)> {
        let (origin_x, origin_y) = self.origin();
        self.img_gaze
            .x
            .iter()
            .zip(&self.img_gaze.y)
            .map(|(x, y)| (x - origin_x, y - origin_y))
            .collect()
    }

    /// Fixation cross translated to stimulus-relative coordinates.
    pub fn fix_point(&self) -> (f64, f64) {
        let (origin_x, origin_y) = self.origin();
        (self.fix_location[0].0 - origin_x, self.fix_location[1].0 - origin_y)
    }

    fn origin(&self) -> (f64, f64) {
        (self.img_origin[0].0, self.img_origin[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_JSON: &str = r#"{
        "taskData": [
            {
                "trialNum": 1,
                "stimName": "faces/face01.jpg",
                "imgOrigin": ["100", 50],
                "fixLocation": [450, "400"],
                "imgGaze": {
                    "x": [110, 120, 130],
                    "y": [60, 70, 80],
                    "ts": [0, 16, 33]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_mixed_numeric_and_string_scalars() {
        let session: RawSession = serde_json::from_str(SESSION_JSON).unwrap();
        assert_eq!(session.trial_count(), 1);

        let trial = &session.task_data[0];
        assert_eq!(trial.trial_num, 1);
        assert_eq!(trial.stim_name, "faces/face01.jpg");

        let points = trial.gaze_points();
        assert_eq!(points, vec![(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);

        let (fx, fy) = trial.fix_point();
        assert_eq!((fx, fy), (350.0, 350.0));
    }

    #[test]
    fn non_numeric_origin_string_fails_to_parse() {
        let garbled = SESSION_JSON.replace("\"100\"", "\"left\"");
        assert!(serde_json::from_str::<RawSession>(&garbled).is_err());
    }

    #[test]
    fn load_reports_malformed_json() {
        let dir = std::env::temp_dir().join(format!("gazeprep-raw-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad_output.json");
        fs::write(&path, "{ not json").unwrap();

        let err = RawSession::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::RawData { .. }));

        fs::remove_dir_all(&dir).ok();
    }
}
