//! gazeprep - preprocessing and AOI analysis for cursor-tracking
//! experiment data.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use gazeprep::aoi::AoiAssigner;
use gazeprep::combine;
use gazeprep::config::Config;
use gazeprep::convert::convert_subject;
use gazeprep::ingest::sync_drop_folder;
use gazeprep::plot;
use gazeprep::report::{RunReport, SubjectOutcome};
use gazeprep::table::GazeTable;

#[derive(Parser, Debug)]
#[command(name = "gazeprep")]
#[command(about = "Preprocess and analyze cursor-tracking experiment data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy new raw exports from the drop folder into subject directories
    Ingest,

    /// Convert raw session JSON into per-subject gaze tables
    Convert {
        /// Subject ids; all subjects when omitted
        subjects: Vec<String>,
    },

    /// Assign AOI labels to per-subject gaze tables
    Assign {
        /// Subject ids; all subjects when omitted
        subjects: Vec<String>,
    },

    /// Combine every subject's raw session into one group table
    CombineRaw,

    /// Combine every subject's labeled gaze table into one group table
    Combine,

    /// Plot raw gaze traces, one image per trial
    PlotRaw {
        /// Subject ids; all subjects when omitted
        subjects: Vec<String>,
    },

    /// Render per-stimulus gaze heatmaps from a combined raw table
    Heatmaps {
        /// Combined raw datafile; defaults to groupData/allSubjsRaw.tsv
        datafile: Option<PathBuf>,
    },

    /// Write the heatmap gallery manifest
    Gallery {
        /// Output file; defaults to groupData/imageURL.txt
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Ingest => {
            let copied = sync_drop_folder(&config)?;
            info!("ingest complete: {copied} new files");
        }
        Commands::Convert { subjects } => run_convert(&config, subjects)?,
        Commands::Assign { subjects } => run_assign(&config, subjects)?,
        Commands::CombineRaw => {
            combine::combine_raw(&config)?;
        }
        Commands::Combine => {
            combine::combine_labeled(&config)?;
        }
        Commands::PlotRaw { subjects } => run_plot_raw(&config, subjects)?,
        Commands::Heatmaps { datafile } => {
            let datafile = datafile
                .unwrap_or_else(|| config.group_dir().join(combine::ALL_SUBJS_RAW));
            let rendered = plot::heatmap::heatmaps_for_group(&config, &datafile)?;
            info!("rendered {rendered} heatmaps");
        }
        Commands::Gallery { output } => {
            let output = output.unwrap_or_else(|| config.group_dir().join("imageURL.txt"));
            plot::write_gallery(&config.group_plots_dir(), &output)?;
        }
    }
    Ok(())
}

/// Explicit subject list, or every subject under the data dir.
fn resolve_subjects(config: &Config, subjects: Vec<String>) -> Result<Vec<String>> {
    if !subjects.is_empty() {
        return Ok(subjects);
    }
    let all = config.list_subjects()?;
    if all.is_empty() {
        bail!("no subject directories under {}", config.data_dir.display());
    }
    Ok(all)
}

fn run_convert(config: &Config, subjects: Vec<String>) -> Result<()> {
    let mut report = RunReport::new("convert");
    for subj_id in resolve_subjects(config, subjects)? {
        match convert_subject(config, &subj_id) {
            Ok(rows) => report.record(SubjectOutcome::completed(&subj_id, format!("{rows} rows"))),
            Err(err) => report.record(SubjectOutcome::failed(&subj_id, format!("{err:#}"))),
        }
    }
    finish(report)
}

fn run_assign(config: &Config, subjects: Vec<String>) -> Result<()> {
    // One assigner for the whole run: subjects share stimuli, so masks
    // decode once
    let mut assigner = AoiAssigner::new(config)?;

    let mut report = RunReport::new("assign");
    for subj_id in resolve_subjects(config, subjects)? {
        match assign_subject(config, &mut assigner, &subj_id) {
            Ok(detail) => report.record(SubjectOutcome::completed(&subj_id, detail)),
            Err(err) => report.record(SubjectOutcome::failed(&subj_id, format!("{err:#}"))),
        }
    }
    finish(report)
}

fn assign_subject(
    config: &Config,
    assigner: &mut AoiAssigner,
    subj_id: &str,
) -> Result<String> {
    let table_path = config.gaze_table_path(subj_id);
    let mut table = GazeTable::read(&table_path)
        .with_context(|| format!("no gaze table for subject {subj_id}; run convert first?"))?;

    let stats = assigner.label_subject(&mut table)?;
    table.write()?;

    Ok(format!(
        "{} trials ({} without AOI data), {} samples",
        stats.trials, stats.missing_trials, stats.samples
    ))
}

fn run_plot_raw(config: &Config, subjects: Vec<String>) -> Result<()> {
    let mut report = RunReport::new("plot-raw");
    for subj_id in resolve_subjects(config, subjects)? {
        match plot::raw::plot_subject(config, &subj_id) {
            Ok(trials) => {
                report.record(SubjectOutcome::completed(&subj_id, format!("{trials} trials")))
            }
            Err(err) => report.record(SubjectOutcome::failed(&subj_id, format!("{err:#}"))),
        }
    }
    finish(report)
}

fn finish(report: RunReport) -> Result<()> {
    if !report.log_summary() {
        bail!("{} subject(s) failed", report.failed_count());
    }
    Ok(())
}
