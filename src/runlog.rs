use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::error::{FeedbackError, Result};
use crate::models::RunLogEntry;
use crate::paths::PathAllocator;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const LOG_HEADERS: [&str; 6] = ["S.No", "Course", "PL", "LOB", "Session Date", "File"];

pub fn log_base_name(timestamp: NaiveDateTime) -> String {
    format!("Feedback_Report_Log_{}", timestamp.format(TIMESTAMP_FORMAT))
}

/// Append-only audit trail of the artifacts written during one run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<RunLogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a written artifact and returns the stored entry. Sequence
    /// numbers start at 1.
    pub fn record(
        &mut self,
        course: &str,
        facilitator: &str,
        line_of_business: &str,
        session_date: &str,
        file: PathBuf,
    ) -> &RunLogEntry {
        let sequence = self.entries.len() + 1;
        self.entries.push(RunLogEntry {
            sequence,
            course: course.to_string(),
            facilitator: facilitator.to_string(),
            line_of_business: line_of_business.to_string(),
            session_date: session_date.to_string(),
            file,
        });
        &self.entries[sequence - 1]
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(LOG_HEADERS);
        for entry in &self.entries {
            table.add_row(vec![
                entry.sequence.to_string(),
                entry.course.clone(),
                entry.facilitator.clone(),
                entry.line_of_business.clone(),
                entry.session_date.clone(),
                entry.file.display().to_string(),
            ]);
        }
        table
    }

    pub fn to_workbook(&self) -> std::result::Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();

        for (col, header) in LOG_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (index, entry) in self.entries.iter().enumerate() {
            let row = index as u32 + 1;
            sheet.write_number(row, 0, entry.sequence as f64)?;
            sheet.write_string(row, 1, &entry.course)?;
            sheet.write_string(row, 2, &entry.facilitator)?;
            sheet.write_string(row, 3, &entry.line_of_business)?;
            sheet.write_string(row, 4, &entry.session_date)?;
            sheet.write_string(row, 5, entry.file.display().to_string())?;
        }
        sheet.autofit();
        Ok(workbook)
    }

    /// Writes the log workbook into `dir` and returns its path. A log
    /// already there from the same second is kept and the new one gets a
    /// ` (n)` suffix.
    pub fn export_xlsx(&self, dir: &Path, timestamp: NaiveDateTime) -> Result<PathBuf> {
        let path = PathAllocator::new().allocate(dir, &log_base_name(timestamp), "xlsx")?;
        let bytes = self.to_workbook()?.save_to_buffer()?;
        fs::write(&path, bytes).map_err(|err| FeedbackError::storage(&path, err))?;
        Ok(path)
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| FeedbackError::storage(path, err.into()))?;
        fs::write(path, json).map_err(|err| FeedbackError::storage(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sample_log() -> RunLog {
        let mut log = RunLog::new();
        log.record("Cloud", "Asha", "SEPO", "05 March 2025", PathBuf::from("/out/a.xlsx"));
        log.record("Python", "Ravi", "TECH CERTS", "", PathBuf::from("/out/b.xlsx"));
        log
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 5)
            .and_then(|date| date.and_hms_opt(14, 7, 9))
            .expect("valid timestamp")
    }

    #[test]
    fn entries_are_numbered_in_order() {
        let log = sample_log();
        let sequences: Vec<usize> = log.entries().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(log.entries()[1].course, "Python");
    }

    #[test]
    fn log_name_uses_compact_timestamp() {
        assert_eq!(log_base_name(timestamp()), "Feedback_Report_Log_20250305_140709");
    }

    #[test]
    fn same_second_exports_do_not_overwrite() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = sample_log().export_xlsx(dir.path(), timestamp()).expect("first");
        let mut shorter = RunLog::new();
        shorter.record("Agile", "Meera", "SEPO", "", PathBuf::from("/out/c.xlsx"));
        let second = shorter.export_xlsx(dir.path(), timestamp()).expect("second");

        assert_eq!(first, dir.path().join("Feedback_Report_Log_20250305_140709.xlsx"));
        assert_eq!(second, dir.path().join("Feedback_Report_Log_20250305_140709 (1).xlsx"));
        let mut workbook: Xlsx<_> = open_workbook(&first).expect("open first");
        let range = workbook.worksheet_range("Sheet1").expect("sheet");
        assert_eq!(range.get_value((2, 1)), Some(&Data::String("Python".into())));
    }

    #[test]
    fn table_has_one_row_per_entry() {
        let rendered = sample_log().to_table().to_string();
        assert!(rendered.contains("Session Date"));
        assert!(rendered.contains("TECH CERTS"));
        assert!(rendered.contains("/out/a.xlsx"));
    }

    #[test]
    fn exports_workbook_and_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = sample_log();

        let path = log.export_xlsx(dir.path(), timestamp()).expect("export xlsx");
        let mut workbook: Xlsx<_> = open_workbook(&path).expect("open log");
        let range = workbook.worksheet_range("Sheet1").expect("sheet");
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("S.No".into())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::Float(2.0)));
        assert_eq!(range.get_value((2, 3)), Some(&Data::String("TECH CERTS".into())));

        let json_path = dir.path().join("log.json");
        log.export_json(&json_path).expect("export json");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).expect("read")).expect("parse");
        assert_eq!(value[0]["S.No"], 1);
        assert_eq!(value[1]["LOB"], "TECH CERTS");
        assert_eq!(value[0]["File"], "/out/a.xlsx");
    }
}
