use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::FeedbackError;

pub const COL_SERIAL: &str = "Sr No";
pub const COL_DATE: &str = "Date";
pub const COL_BEST_PART: &str = "What was the best part of this session and how has it helped you?";
pub const COL_RATING: &str = "Rate the overall satisfaction level of this session";
pub const COL_IMPROVEMENT: &str = "What according to you could be improved in this session?";
pub const COL_FACILITATOR: &str = "PL Name";
pub const COL_COURSE: &str = "Course Name";
pub const COL_TOPIC: &str = "Topic Name";
pub const COL_LOB: &str = "LOB";

pub const EXPECTED_COLUMNS: [&str; 9] = [
    COL_SERIAL,
    COL_DATE,
    COL_BEST_PART,
    COL_RATING,
    COL_IMPROVEMENT,
    COL_FACILITATOR,
    COL_COURSE,
    COL_TOPIC,
    COL_LOB,
];

/// Lines of business an operator may pick from.
pub const KNOWN_LOBS: [&str; 3] = ["Tech Certs", "SEPO", "OC,DD,BC"];

/// An untyped cell as it arrives from the dump.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

/// One respondent's answer to one session survey, fully normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub serial: String,
    pub session_date: String,
    pub best_part: String,
    pub rating: Option<f64>,
    pub improvement: String,
    pub facilitator: String,
    pub course: String,
    pub topic: String,
    pub line_of_business: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub course: String,
    pub facilitator: String,
    pub session_date: String,
    pub line_of_business: String,
}

/// All records sharing one [`GroupKey`], borrowed from the run's record set
/// in input order.
#[derive(Debug, Clone)]
pub struct ReportGroup<'a> {
    pub key: GroupKey,
    pub records: Vec<&'a FeedbackRecord>,
}

impl ReportGroup<'_> {
    /// First non-empty topic among the records, or the course name.
    pub fn topic_label(&self) -> &str {
        self.records
            .iter()
            .map(|record| record.topic.as_str())
            .find(|topic| !topic.is_empty())
            .unwrap_or(self.key.course.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEntry {
    #[serde(rename = "S.No")]
    pub sequence: usize,
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "PL")]
    pub facilitator: String,
    #[serde(rename = "LOB")]
    pub line_of_business: String,
    #[serde(rename = "Session Date")]
    pub session_date: String,
    #[serde(rename = "File")]
    pub file: PathBuf,
}

/// Which lines of business a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobSelection {
    Single(String),
    All,
}

impl LobSelection {
    pub fn valid_values() -> String {
        KNOWN_LOBS
            .iter()
            .map(|lob| format!("'{lob}'"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Turns an optional operator choice into a selection. Nothing chosen is
    /// an error so that a run never starts without an explicit scope.
    pub fn from_choice(choice: Option<&str>) -> Result<Self, FeedbackError> {
        match choice.map(str::trim) {
            None | Some("") => Err(FeedbackError::NoSelection {
                valid: Self::valid_values(),
            }),
            Some(value) if value.eq_ignore_ascii_case("select") => Err(FeedbackError::NoSelection {
                valid: Self::valid_values(),
            }),
            Some(value) => value.parse(),
        }
    }
}

impl FromStr for LobSelection {
    type Err = FeedbackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(LobSelection::All);
        }
        KNOWN_LOBS
            .iter()
            .find(|lob| lob.eq_ignore_ascii_case(value))
            .map(|lob| LobSelection::Single(lob.to_uppercase()))
            .ok_or_else(|| FeedbackError::UnknownLob {
                given: value.to_string(),
                valid: Self::valid_values(),
            })
    }
}

impl fmt::Display for LobSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobSelection::Single(lob) => f.write_str(lob),
            LobSelection::All => f.write_str("All"),
        }
    }
}
