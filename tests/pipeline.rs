//! End-to-end pipeline tests over a synthetic experiment data tree:
//! raw session JSON -> convert -> AOI assignment -> group combine -> plots.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use serde_json::json;

use gazeprep::aoi::AoiAssigner;
use gazeprep::combine;
use gazeprep::config::Config;
use gazeprep::convert::convert_subject;
use gazeprep::error::PipelineError;
use gazeprep::plot;
use gazeprep::table::{GazeSample, GazeTable, AOI_COLUMN};

/// Fresh scratch tree for one test, with the standard experiment layout.
fn scratch_config(name: &str) -> Config {
    let root = Path::new(env!("CARGO_TARGET_TMPDIR")).join(name);
    if root.exists() {
        fs::remove_dir_all(&root).unwrap();
    }
    let config = Config {
        data_dir: root.join("data"),
        stimuli_dir: root.join("stimuli"),
        aoi_dir: root.join("stimuli/AOIs"),
        drop_dir: root.join("incoming"),
        scale_factor: 1.0,
        ..Config::default()
    };
    fs::create_dir_all(&config.data_dir).unwrap();
    fs::create_dir_all(config.stimuli_dir.join("faces")).unwrap();
    fs::create_dir_all(&config.aoi_dir).unwrap();
    config
}

/// A 4x4 mask with rightEye at (1,1) and leftEye at (2,2).
fn write_standard_mask(config: &Config, stem: &str) {
    let mut mask = GrayImage::new(4, 4);
    mask.put_pixel(1, 1, image::Luma([64]));
    mask.put_pixel(2, 2, image::Luma([128]));
    mask.save(config.aoi_dir.join(format!("{stem}_AOIs.png"))).unwrap();
}

fn write_stimulus(config: &Config, stim: &str, width: u32, height: u32) {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 140, 160]));
    image.save(config.stimuli_dir.join(stim)).unwrap();
}

fn write_session(config: &Config, subj_id: &str, session: serde_json::Value) {
    let dir = config.subject_dir(subj_id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        config.raw_json_path(subj_id),
        serde_json::to_string_pretty(&session).unwrap(),
    )
    .unwrap();
}

fn two_trial_session() -> serde_json::Value {
    json!({
        "taskData": [
            {
                "trialNum": 1,
                "stimName": "faces/faceA.png",
                "imgOrigin": [0, 0],
                "fixLocation": [2, 2],
                "imgGaze": { "x": [1, 2, 0], "y": [1, 2, 3], "ts": [0, 16, 33] }
            },
            {
                "trialNum": 2,
                "stimName": "faces/faceB.png",
                "imgOrigin": ["0", 0],
                "fixLocation": ["1", "1"],
                "imgGaze": { "x": [1, 1], "y": [1, 2], "ts": [0, 16] }
            }
        ]
    })
}

fn aoi_column(table: &GazeTable) -> Vec<String> {
    let idx = table.column_index(AOI_COLUMN).unwrap();
    table.rows().iter().map(|row| row[idx].clone()).collect()
}

#[test]
fn convert_assign_roundtrip_with_missing_mask_trial() {
    let config = scratch_config("convert-assign");
    write_standard_mask(&config, "faceA");
    write_session(&config, "s01", two_trial_session());

    let rows = convert_subject(&config, "s01").unwrap();
    assert_eq!(rows, 5);

    let table_path = config.gaze_table_path("s01");
    let mut table = GazeTable::read(&table_path).unwrap();
    let mut assigner = AoiAssigner::new(&config).unwrap();
    let stats = assigner.label_subject(&mut table).unwrap();
    table.write().unwrap();

    assert_eq!(stats.trials, 2);
    assert_eq!(stats.missing_trials, 1);
    assert_eq!(stats.samples, 5);

    let written = GazeTable::read(&table_path).unwrap();
    assert_eq!(
        aoi_column(&written),
        vec!["rightEye", "leftEye", "none", "", ""]
    );
}

#[test]
fn reassignment_is_idempotent() {
    let config = scratch_config("reassign");
    write_standard_mask(&config, "faceA");
    write_session(&config, "s01", two_trial_session());
    convert_subject(&config, "s01").unwrap();

    let table_path = config.gaze_table_path("s01");
    for _ in 0..2 {
        let mut table = GazeTable::read(&table_path).unwrap();
        let mut assigner = AoiAssigner::new(&config).unwrap();
        assigner.label_subject(&mut table).unwrap();
        table.write().unwrap();
    }
    let first = fs::read_to_string(&table_path).unwrap();

    let mut table = GazeTable::read(&table_path).unwrap();
    let mut assigner = AoiAssigner::new(&config).unwrap();
    assigner.label_subject(&mut table).unwrap();
    table.write().unwrap();

    let second = fs::read_to_string(&table_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn corrupt_mask_is_fatal_for_the_trial() {
    let config = scratch_config("corrupt-mask");
    fs::write(config.aoi_dir.join("faceA_AOIs.png"), b"not a png").unwrap();

    let mut assigner = AoiAssigner::new(&config).unwrap();
    let samples = vec![GazeSample {
        x: 1.0,
        y: 1.0,
        trial_num: 1,
        subj_id: "s01".to_string(),
        stim: "faces/faceA.png".to_string(),
    }];

    let err = assigner.label_trial(&samples, "faces/faceA.png").unwrap_err();
    assert!(matches!(err, PipelineError::MaskLoad { .. }));
}

#[test]
fn configured_display_size_catches_inconsistent_masks() {
    let mut config = scratch_config("display-check");
    config.scale_factor = 0.5;
    config.display_size = Some([8, 8]);

    // 4x4 mask agrees with 8x8 display at scale 0.5
    write_standard_mask(&config, "faceA");
    // 6x6 mask does not
    let bad = GrayImage::new(6, 6);
    bad.save(config.aoi_dir.join("faceB_AOIs.png")).unwrap();

    let sample = |stim: &str| {
        vec![GazeSample {
            x: 2.0,
            y: 2.0,
            trial_num: 1,
            subj_id: "s01".to_string(),
            stim: stim.to_string(),
        }]
    };

    let mut assigner = AoiAssigner::new(&config).unwrap();
    assert!(assigner
        .label_trial(&sample("faces/faceA.png"), "faces/faceA.png")
        .is_ok());

    let err = assigner
        .label_trial(&sample("faces/faceB.png"), "faces/faceB.png")
        .unwrap_err();
    assert!(matches!(err, PipelineError::ScaleMismatch { .. }));
}

#[test]
fn group_combines_cover_all_subjects() {
    let config = scratch_config("combine");
    write_standard_mask(&config, "faceA");
    write_session(&config, "s01", two_trial_session());
    write_session(&config, "s02", two_trial_session());

    let (raw_path, raw_subjects) = combine::combine_raw(&config).unwrap();
    assert_eq!(raw_subjects, 2);
    let raw_table = GazeTable::read(&raw_path).unwrap();
    assert_eq!(raw_table.len(), 10);
    assert_eq!(raw_table.columns(), ["x", "y", "subjID", "stim"]);

    convert_subject(&config, "s01").unwrap();
    convert_subject(&config, "s02").unwrap();
    let (labeled_path, labeled_subjects) = combine::combine_labeled(&config).unwrap();
    assert_eq!(labeled_subjects, 2);
    let labeled = GazeTable::read(&labeled_path).unwrap();
    assert_eq!(labeled.len(), 10);

    // Group outputs must not be picked up as subjects on a second pass
    assert_eq!(config.list_subjects().unwrap(), vec!["s01", "s02"]);
}

#[test]
fn plots_and_gallery_render_from_synthetic_data() {
    let config = scratch_config("plots");
    write_standard_mask(&config, "faceA");
    write_stimulus(&config, "faces/faceA.png", 24, 24);
    write_stimulus(&config, "faces/faceB.png", 24, 24);
    write_session(&config, "s01", two_trial_session());

    let trials = plot::raw::plot_subject(&config, "s01").unwrap();
    assert_eq!(trials, 2);
    assert!(config.subject_plots_dir("s01").join("trial1.png").exists());
    assert!(config.subject_plots_dir("s01").join("trial2.png").exists());

    let (raw_path, _) = combine::combine_raw(&config).unwrap();
    let rendered = plot::heatmap::heatmaps_for_group(&config, &raw_path).unwrap();
    assert_eq!(rendered, 2);
    assert!(config.group_plots_dir().join("faceA.png").exists());

    let manifest: PathBuf = config.group_dir().join("imageURL.txt");
    let entries = plot::write_gallery(&config.group_plots_dir(), &manifest).unwrap();
    assert_eq!(entries, 2);
    let contents = fs::read_to_string(&manifest).unwrap();
    assert!(contents.contains("<img src=\"images/heatmaps/faceA.png\">"));
}
