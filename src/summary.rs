use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{LobSelection, RunLogEntry};
use crate::pipeline::RunContext;

#[derive(Debug, Clone, PartialEq)]
pub struct LobSummary {
    pub line_of_business: String,
    pub reports: usize,
}

pub fn summarize_by_lob(entries: &[RunLogEntry]) -> Vec<LobSummary> {
    let mut map: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *map.entry(entry.line_of_business.as_str()).or_insert(0) += 1;
    }

    let mut summaries: Vec<LobSummary> = map
        .into_iter()
        .map(|(lob, reports)| LobSummary {
            line_of_business: lob.to_string(),
            reports,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.reports
            .cmp(&a.reports)
            .then_with(|| a.line_of_business.cmp(&b.line_of_business))
    });
    summaries
}

pub fn format_average(average: Option<f64>) -> String {
    format!("{:.2}", average.unwrap_or(0.0))
}

pub fn build_summary(selection: &LobSelection, ctx: &RunContext) -> String {
    let mut output = String::new();
    let summaries = summarize_by_lob(ctx.log.entries());

    let _ = writeln!(output, "Feedback reports generated for {selection}");
    let _ = writeln!(output, "- Total reports generated: {}", ctx.log.len());
    let _ = writeln!(output, "- LOBs processed: {}", ctx.lobs_processed().len());
    let _ = writeln!(output, "- Average rating: {}", format_average(ctx.average_rating()));
    let _ = writeln!(output);
    let _ = writeln!(output, "Reports by LOB:");

    if summaries.is_empty() {
        let _ = writeln!(output, "No reports were written.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} report{}",
                summary.line_of_business,
                summary.reports,
                if summary.reports == 1 { "" } else { "s" }
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawRow;
    use crate::models::{RawValue, COL_COURSE, COL_FACILITATOR, COL_LOB, COL_RATING};
    use crate::pipeline::{normalize_rows, run, NullProgress, RunOptions, RunOutcome};
    use std::path::PathBuf;

    fn entry(sequence: usize, lob: &str) -> RunLogEntry {
        RunLogEntry {
            sequence,
            course: "Cloud".into(),
            facilitator: "Asha".into(),
            line_of_business: lob.into(),
            session_date: String::new(),
            file: PathBuf::from("report.xlsx"),
        }
    }

    #[test]
    fn lob_counts_sort_by_volume_then_name() {
        let entries = vec![
            entry(1, "TECH CERTS"),
            entry(2, "SEPO"),
            entry(3, "SEPO"),
            entry(4, "OC,DD,BC"),
        ];
        let summaries = summarize_by_lob(&entries);
        let order: Vec<(&str, usize)> = summaries
            .iter()
            .map(|s| (s.line_of_business.as_str(), s.reports))
            .collect();
        assert_eq!(order, vec![("SEPO", 2), ("OC,DD,BC", 1), ("TECH CERTS", 1)]);
    }

    #[test]
    fn average_formats_with_two_decimals() {
        assert_eq!(format_average(Some(4.0 / 3.0)), "1.33");
        assert_eq!(format_average(None), "0.00");
    }

    #[test]
    fn summary_lists_totals() {
        let dir = tempfile::tempdir().expect("temp dir");
        let rows = vec![
            RawRow::new()
                .with(COL_COURSE, RawValue::Text("Cloud".into()))
                .with(COL_FACILITATOR, RawValue::Text("Asha".into()))
                .with(COL_LOB, RawValue::Text("SEPO".into()))
                .with(COL_RATING, RawValue::Int(4)),
            RawRow::new()
                .with(COL_COURSE, RawValue::Text("Agile".into()))
                .with(COL_FACILITATOR, RawValue::Text("Meera".into()))
                .with(COL_LOB, RawValue::Text("SEPO".into()))
                .with(COL_RATING, RawValue::Int(5)),
        ];
        let records = normalize_rows(&rows);
        let selection = LobSelection::Single("SEPO".into());
        let outcome = run(&records, &selection, &RunOptions::new(dir.path()), &mut NullProgress)
            .expect("run");
        let RunOutcome::Completed(ctx) = outcome else {
            panic!("expected a completed run");
        };

        let summary = build_summary(&selection, &ctx);
        assert!(summary.contains("Feedback reports generated for SEPO"));
        assert!(summary.contains("- Total reports generated: 2"));
        assert!(summary.contains("- LOBs processed: 1"));
        assert!(summary.contains("- Average rating: 4.50"));
        assert!(summary.contains("- SEPO: 2 reports"));
    }
}
