use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod bundle;
mod error;
mod grouping;
mod ingest;
mod models;
mod normalize;
mod paths;
mod pipeline;
mod render;
mod runlog;
mod summary;

use models::LobSelection;
use pipeline::{ProgressSink, ProgressUpdate, RunOptions, RunOutcome};

#[derive(Parser)]
#[command(name = "feedback-reports")]
#[command(about = "Session feedback report generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one formatted report per course, facilitator, date and LOB
    Generate {
        /// Survey dump: a workbook (.xlsx, .xls, .ods) or a .csv file
        #[arg(long)]
        input: PathBuf,
        /// Data sheet inside the workbook
        #[arg(long, env = "FEEDBACK_SHEET", default_value = "Dump")]
        sheet: String,
        /// Line of business: "Tech Certs", "SEPO", "OC,DD,BC" or "All"
        #[arg(long, env = "FEEDBACK_LOB")]
        lob: Option<String>,
        /// Output root folder [default: Downloads]
        #[arg(long, env = "FEEDBACK_OUTPUT_ROOT")]
        out: Option<PathBuf>,
        /// Folder for the generation log workbook [default: output root]
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Also write the generation log as JSON
        #[arg(long)]
        log_json: Option<PathBuf>,
        /// Package the generated folders into zip bundles
        #[arg(long = "bundle")]
        bundle_reports: bool,
        /// Folder for zip bundles [default: output root]
        #[arg(long)]
        bundle_dir: Option<PathBuf>,
        /// Attribution text for the report footer
        #[arg(long, env = "FEEDBACK_FOOTER")]
        footer: Option<String>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Package previously generated report folders into zip bundles
    Bundle {
        /// Line of business: "Tech Certs", "SEPO", "OC,DD,BC" or "All"
        #[arg(long, env = "FEEDBACK_LOB")]
        lob: Option<String>,
        /// Output root holding the "Feedback Reports for ..." folders [default: Downloads]
        #[arg(long, env = "FEEDBACK_OUTPUT_ROOT")]
        out: Option<PathBuf>,
        /// Folder for zip bundles [default: output root]
        #[arg(long)]
        bundle_dir: Option<PathBuf>,
    },
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.green/white}] {pos}/{len} ({percent}%)")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn group_completed(&mut self, update: &ProgressUpdate<'_>) {
        debug!(fraction = update.fraction(), file = %update.entry.file.display(), "report written");
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.completed as u64);
        self.bar.set_message(format!(
            "{} reports | {} LOBs | avg {}",
            update.reports_generated,
            update.lobs_processed,
            summary::format_average(update.average_rating)
        ));
    }
}

fn default_output_root() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

fn resolve_root(out: Option<PathBuf>) -> PathBuf {
    out.map(expand_home).unwrap_or_else(default_output_root)
}

fn write_bundles(
    targets: &[bundle::BundleTarget],
    bundle_dir: &Path,
    selection: &LobSelection,
) -> anyhow::Result<()> {
    if targets.is_empty() {
        warn!(selection = %selection, "no report folders to bundle");
        println!("No reports found for selected LOB: {selection}");
        return Ok(());
    }
    let timestamp = chrono::Local::now().naive_local();
    let written = bundle::write_bundles(targets, bundle_dir, timestamp)
        .context("failed to create zip bundles")?;
    for path in written {
        println!("ZIP ready: {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            sheet,
            lob,
            out,
            log_dir,
            log_json,
            bundle_reports,
            bundle_dir,
            footer,
            no_progress,
        } => {
            let selection = LobSelection::from_choice(lob.as_deref())?;
            let dump = ingest::load_dump(&input, &sheet)
                .with_context(|| format!("failed to load survey dump {}", input.display()))?;
            let records = pipeline::normalize_rows(&dump.rows);
            info!(records = records.len(), "normalized survey rows");

            let root = resolve_root(out);
            std::fs::create_dir_all(&root)
                .with_context(|| format!("failed to create output folder {}", root.display()))?;

            let mut options = RunOptions::new(&root);
            if let Some(footer) = footer {
                options.renderer = options.renderer.footer(footer);
            }
            let mut progress = BarProgress::new(!no_progress);
            let outcome = pipeline::run(&records, &selection, &options, &mut progress)
                .context("report generation stopped")?;
            progress.bar.finish_and_clear();

            let ctx = match outcome {
                RunOutcome::Completed(ctx) => ctx,
                RunOutcome::Empty { lobs } => {
                    warn!(lobs = ?lobs, "selection matched no records");
                    println!("No records found for the selected LOB.");
                    return Ok(());
                }
            };

            println!("{}", ctx.log.to_table());
            println!();
            print!("{}", summary::build_summary(&selection, &ctx));

            let timestamp = chrono::Local::now().naive_local();
            let log_dir = log_dir.map(expand_home).unwrap_or_else(|| root.clone());
            let log_path = ctx
                .log
                .export_xlsx(&log_dir, timestamp)
                .context("failed to write generation log")?;
            println!("Generation log: {}", log_path.display());

            if let Some(json_path) = log_json {
                ctx.log
                    .export_json(&json_path)
                    .context("failed to write generation log as JSON")?;
                println!("Generation log (JSON): {}", json_path.display());
            }

            if bundle_reports {
                let bundle_dir = bundle_dir.map(expand_home).unwrap_or_else(|| root.clone());
                let targets = bundle::targets_for_run(&ctx.log, &selection);
                write_bundles(&targets, &bundle_dir, &selection)?;
            }

            println!("Feedback Reports Generated Successfully for {selection}");
        }
        Commands::Bundle {
            lob,
            out,
            bundle_dir,
        } => {
            let selection = LobSelection::from_choice(lob.as_deref())?;
            let root = resolve_root(out);
            let targets = bundle::scan_targets(&root, &selection)
                .with_context(|| format!("failed to scan {}", root.display()))?;
            let bundle_dir = bundle_dir.map(expand_home).unwrap_or_else(|| root.clone());
            write_bundles(&targets, &bundle_dir, &selection)?;
        }
    }

    Ok(())
}
