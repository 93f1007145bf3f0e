use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FeedbackError, Result};
use crate::models::GroupKey;
use crate::normalize::safe_filename;

pub const SESSION_FOLDER_PREFIX: &str = "Feedback Reports for";
pub const UNDATED_SESSION_FOLDER: &str = "Feedback Reports";

pub fn session_folder_name(session_date: &str) -> String {
    if session_date.is_empty() {
        UNDATED_SESSION_FOLDER.to_string()
    } else {
        format!("{SESSION_FOLDER_PREFIX} {}", safe_filename(session_date))
    }
}

pub fn report_base_name(course: &str, facilitator: &str) -> String {
    format!(
        "Feedback Report - {} - {}",
        safe_filename(course),
        safe_filename(facilitator)
    )
}

/// `{root}/{session folder}/{LOB}` for a group.
pub fn group_folder(root: &Path, key: &GroupKey) -> PathBuf {
    root.join(session_folder_name(&key.session_date))
        .join(safe_filename(&key.line_of_business))
}

/// Hands out destination paths that neither exist on disk nor were handed
/// out earlier in the same run. Only safe for a single process.
#[derive(Debug, Default)]
pub struct PathAllocator {
    issued: HashSet<PathBuf>,
}

impl PathAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `folder` if needed and returns `folder/base.ext`, or
    /// `folder/base (n).ext` for the first free `n`.
    pub fn allocate(&mut self, folder: &Path, base: &str, ext: &str) -> Result<PathBuf> {
        fs::create_dir_all(folder).map_err(|err| FeedbackError::storage(folder, err))?;

        let mut candidate = folder.join(format!("{base}.{ext}"));
        let mut n = 1;
        while candidate.exists() || self.issued.contains(&candidate) {
            candidate = folder.join(format!("{base} ({n}).{ext}"));
            n += 1;
        }
        self.issued.insert(candidate.clone());
        Ok(candidate)
    }

    pub fn allocate_report(&mut self, root: &Path, key: &GroupKey) -> Result<PathBuf> {
        let folder = group_folder(root, key);
        self.allocate(&folder, &report_base_name(&key.course, &key.facilitator), "xlsx")
    }
}
