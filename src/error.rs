use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced at the run boundary. Field-level coercion problems never
/// reach this type; they fall back to safe defaults where they occur.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("no line of business selected; choose one of {valid} or All")]
    NoSelection { valid: String },
    #[error("unknown line of business '{given}'; choose one of {valid} or All")]
    UnknownLob { given: String, valid: String },
    #[error("sheet '{sheet}' not found in {}", .path.display())]
    MissingSheet { sheet: String, path: PathBuf },
    #[error("unsupported input file {}; expected a workbook or .csv", .0.display())]
    UnsupportedInput(PathBuf),
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to render spreadsheet: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),
    #[error("failed to build zip bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),
    #[error("failed to write {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FeedbackError {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FeedbackError::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedbackError>;
