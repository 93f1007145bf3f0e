//! Batch driver: records in, one workbook per report group out.
//!
//! Groups are processed one at a time; each is rendered, given a fresh path,
//! written, and logged before the next starts. A storage failure aborts the
//! rest of the run and leaves already-written files in place.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{FeedbackError, Result};
use crate::grouping::GroupPlan;
use crate::ingest::{build_record, RawRow};
use crate::models::{FeedbackRecord, LobSelection, ReportGroup, RunLogEntry};
use crate::paths::PathAllocator;
use crate::render::{ReportLayout, ReportRenderer};
use crate::runlog::RunLog;

/// Mutable state owned by one run and handed back to the caller at the end.
#[derive(Debug, Default)]
pub struct RunContext {
    pub log: RunLog,
    ratings: Vec<f64>,
    lobs: Vec<String>,
    allocator: PathAllocator,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            log: RunLog::new(),
            ..Self::default()
        }
    }

    pub fn average_rating(&self) -> Option<f64> {
        if self.ratings.is_empty() {
            None
        } else {
            Some(self.ratings.iter().sum::<f64>() / self.ratings.len() as f64)
        }
    }

    /// Distinct lines of business with at least one report written.
    pub fn lobs_processed(&self) -> &[String] {
        &self.lobs
    }

    fn note_lob(&mut self, lob: &str) {
        if !self.lobs.iter().any(|seen| seen == lob) {
            self.lobs.push(lob.to_string());
        }
    }
}

/// Snapshot sent after each group is written.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate<'a> {
    pub completed: usize,
    pub total: usize,
    pub reports_generated: usize,
    pub lobs_processed: usize,
    pub average_rating: Option<f64>,
    pub entry: &'a RunLogEntry,
}

impl ProgressUpdate<'_> {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub trait ProgressSink {
    fn group_completed(&mut self, update: &ProgressUpdate<'_>);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressUpdate<'_>),
{
    fn group_completed(&mut self, update: &ProgressUpdate<'_>) {
        self(update)
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

#[cfg(test)]
impl ProgressSink for NullProgress {
    fn group_completed(&mut self, _update: &ProgressUpdate<'_>) {}
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunContext),
    /// The selection matched no records; nothing was written.
    Empty { lobs: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub renderer: ReportRenderer,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            renderer: ReportRenderer::new(),
        }
    }
}

pub struct RenderedReport {
    pub layout: ReportLayout,
    pub bytes: Vec<u8>,
}

pub fn normalize_rows(rows: &[RawRow]) -> Vec<FeedbackRecord> {
    rows.iter().map(build_record).collect()
}

pub fn build_groups<'a>(records: &'a [FeedbackRecord], selection: &LobSelection) -> GroupPlan<'a> {
    crate::grouping::build_groups(records, selection)
}

pub fn render_group(renderer: &ReportRenderer, group: &ReportGroup<'_>) -> Result<RenderedReport> {
    let (layout, bytes) = renderer.render_to_bytes(group)?;
    Ok(RenderedReport { layout, bytes })
}

pub fn run(
    records: &[FeedbackRecord],
    selection: &LobSelection,
    options: &RunOptions,
    progress: &mut dyn ProgressSink,
) -> Result<RunOutcome> {
    let plan = build_groups(records, selection);
    if plan.is_empty() {
        return Ok(RunOutcome::Empty { lobs: plan.lobs });
    }

    let total = plan.groups.len();
    info!(
        selection = %selection,
        groups = total,
        lobs = ?plan.lobs,
        root = %options.root.display(),
        "generating feedback reports"
    );

    let mut ctx = RunContext::new();
    for (index, group) in plan.groups.iter().enumerate() {
        let report = render_group(&options.renderer, group)?;
        let path = ctx.allocator.allocate_report(&options.root, &group.key)?;
        fs::write(&path, &report.bytes).map_err(|err| FeedbackError::storage(&path, err))?;
        debug!(
            course = %group.key.course,
            facilitator = %group.key.facilitator,
            lob = %group.key.line_of_business,
            path = %path.display(),
            "wrote report"
        );

        ctx.ratings.extend(report.layout.rated_values());
        ctx.note_lob(&group.key.line_of_business);
        let average_rating = ctx.average_rating();
        let lobs_processed = ctx.lobs.len();
        let key = &group.key;
        let entry = ctx.log.record(
            &key.course,
            &key.facilitator,
            &key.line_of_business,
            &key.session_date,
            path,
        );

        progress.group_completed(&ProgressUpdate {
            completed: index + 1,
            total,
            reports_generated: entry.sequence,
            lobs_processed,
            average_rating,
            entry,
        });
    }

    info!(reports = ctx.log.len(), "feedback reports generated");
    Ok(RunOutcome::Completed(ctx))
}
