use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::error::{FeedbackError, Result};
use crate::models::{
    FeedbackRecord, RawValue, COL_BEST_PART, COL_COURSE, COL_DATE, COL_FACILITATOR,
    COL_IMPROVEMENT, COL_LOB, COL_RATING, COL_SERIAL, COL_TOPIC, EXPECTED_COLUMNS,
};
use crate::normalize::{clean_value, format_date, parse_rating, raw_to_text};

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

static EMPTY: RawValue = RawValue::Empty;

/// One data row keyed by trimmed header text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<String, RawValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, label: &str, value: RawValue) -> Self {
        self.insert(label, value);
        self
    }

    /// Keeps the first value seen for a label.
    pub fn insert(&mut self, label: &str, value: RawValue) {
        self.cells.entry(label.trim().to_string()).or_insert(value);
    }

    /// Missing columns read as empty cells.
    pub fn get(&self, label: &str) -> &RawValue {
        self.cells.get(label).unwrap_or(&EMPTY)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(RawValue::is_empty)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dump {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Dump {
    pub fn missing_columns(&self) -> Vec<&'static str> {
        EXPECTED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !self.headers.iter().any(|header| header == column))
            .collect()
    }
}

/// Loads the survey dump from a workbook sheet or a CSV file, chosen by the
/// file extension.
pub fn load_dump(path: &Path, sheet: &str) -> Result<Dump> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let dump = if extension == "csv" {
        load_csv(path)?
    } else if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        load_workbook(path, sheet)?
    } else {
        return Err(FeedbackError::UnsupportedInput(path.to_path_buf()));
    };

    let missing = dump.missing_columns();
    if !missing.is_empty() {
        warn!(columns = ?missing, "input is missing expected columns; treating them as empty");
    }
    debug!(rows = dump.rows.len(), path = %path.display(), "loaded survey dump");
    Ok(dump)
}

pub fn load_workbook(path: &Path, sheet: &str) -> Result<Dump> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(FeedbackError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| raw_to_text(&raw_from_cell(cell)).trim().to_string())
            .collect(),
        None => return Ok(Dump::default()),
    };

    let mut dump = Dump {
        headers,
        rows: Vec::new(),
    };
    for row in rows {
        let mut raw = RawRow::new();
        for (header, cell) in dump.headers.iter().zip(row.iter()) {
            if !header.is_empty() {
                raw.insert(header, raw_from_cell(cell));
            }
        }
        if !raw.is_blank() {
            dump.rows.push(raw);
        }
    }
    Ok(dump)
}

pub fn load_csv(path: &Path) -> Result<Dump> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    read_csv(&mut reader)
}

fn read_csv<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Dump> {
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut dump = Dump {
        headers,
        rows: Vec::new(),
    };
    for result in reader.records() {
        let record = result?;
        let mut raw = RawRow::new();
        for (header, value) in dump.headers.iter().zip(record.iter()) {
            if header.is_empty() {
                continue;
            }
            let value = if value.is_empty() {
                RawValue::Empty
            } else {
                RawValue::Text(value.to_string())
            };
            raw.insert(header, value);
        }
        if !raw.is_blank() {
            dump.rows.push(raw);
        }
    }
    Ok(dump)
}

fn raw_from_cell(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(text) => RawValue::Text(text.clone()),
        Data::Int(number) => RawValue::Int(*number),
        Data::Float(number) => RawValue::Float(*number),
        Data::Bool(flag) => RawValue::Bool(*flag),
        Data::DateTime(value) => value
            .as_datetime()
            .map(RawValue::DateTime)
            .unwrap_or_else(|| RawValue::Float(value.as_f64())),
        Data::DateTimeIso(text) | Data::DurationIso(text) => RawValue::Text(text.clone()),
        Data::Error(error) => RawValue::Text(error.to_string()),
    }
}

/// Maps one dump row to a record. Every field is cleaned; the line of
/// business is upper-cased so selection matches regardless of case.
pub fn build_record(row: &RawRow) -> FeedbackRecord {
    FeedbackRecord {
        serial: clean_value(row.get(COL_SERIAL)),
        session_date: format_date(row.get(COL_DATE)),
        best_part: clean_value(row.get(COL_BEST_PART)),
        rating: parse_rating(&clean_value(row.get(COL_RATING))),
        improvement: clean_value(row.get(COL_IMPROVEMENT)),
        facilitator: clean_value(row.get(COL_FACILITATOR)),
        course: clean_value(row.get(COL_COURSE)),
        topic: clean_value(row.get(COL_TOPIC)),
        line_of_business: clean_value(row.get(COL_LOB)).to_uppercase(),
    }
}
