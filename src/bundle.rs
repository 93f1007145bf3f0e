use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{FeedbackError, Result};
use crate::models::LobSelection;
use crate::normalize::safe_filename;
use crate::paths::{PathAllocator, SESSION_FOLDER_PREFIX, UNDATED_SESSION_FOLDER};
use crate::runlog::{RunLog, TIMESTAMP_FORMAT};

pub const ALL_LOBS_SCOPE: &str = "All_LOBs";

/// A folder to package and the scope label that goes into the bundle name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BundleTarget {
    pub scope: String,
    pub folder: PathBuf,
}

pub fn bundle_base_name(scope: &str, timestamp: NaiveDateTime) -> String {
    format!("Feedback_Reports_{}_{}", scope, timestamp.format(TIMESTAMP_FORMAT))
}

/// Folders written during a run: one per LOB folder for a single selection,
/// one per session folder for `All`.
pub fn targets_for_run(log: &RunLog, selection: &LobSelection) -> Vec<BundleTarget> {
    let lob_folders: BTreeSet<&Path> = log
        .entries()
        .iter()
        .filter_map(|entry| entry.file.parent())
        .collect();

    let targets: BTreeSet<BundleTarget> = match selection {
        LobSelection::All => lob_folders
            .iter()
            .filter_map(|folder| folder.parent())
            .map(|session| BundleTarget {
                scope: ALL_LOBS_SCOPE.to_string(),
                folder: session.to_path_buf(),
            })
            .collect(),
        LobSelection::Single(_) => lob_folders
            .iter()
            .map(|folder| BundleTarget {
                scope: folder_name(folder),
                folder: folder.to_path_buf(),
            })
            .collect(),
    };
    targets.into_iter().collect()
}

/// Looks for previously generated session folders under `root` and picks
/// the folders matching `selection`.
pub fn scan_targets(root: &Path, selection: &LobSelection) -> Result<Vec<BundleTarget>> {
    let mut sessions: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && is_session_folder(&folder_name(path)))
        .collect();
    sessions.sort();

    let mut targets = Vec::new();
    for session in sessions {
        match selection {
            LobSelection::All => targets.push(BundleTarget {
                scope: ALL_LOBS_SCOPE.to_string(),
                folder: session,
            }),
            LobSelection::Single(lob) => {
                let wanted = safe_filename(lob);
                let mut matches: Vec<PathBuf> = fs::read_dir(&session)?
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir() && folder_name(path).eq_ignore_ascii_case(&wanted))
                    .collect();
                matches.sort();
                targets.extend(matches.into_iter().map(|folder| BundleTarget {
                    scope: folder_name(&folder),
                    folder,
                }));
            }
        }
    }
    Ok(targets)
}

fn is_session_folder(name: &str) -> bool {
    name.starts_with(SESSION_FOLDER_PREFIX) || name == UNDATED_SESSION_FOLDER
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Zips everything under `folder` in memory. Entry names are relative to
/// `folder` and use `/` separators.
pub fn zip_folder(folder: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(folder).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, entry_options())?;
        } else {
            writer.start_file(name, entry_options())?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Packages each target into `bundle_dir` and returns the written paths.
pub fn write_bundles(
    targets: &[BundleTarget],
    bundle_dir: &Path,
    timestamp: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    let mut allocator = PathAllocator::new();
    let mut written = Vec::with_capacity(targets.len());

    for target in targets {
        let bytes = zip_folder(&target.folder)?;
        let base = bundle_base_name(&safe_filename(&target.scope), timestamp);
        let path = allocator.allocate(bundle_dir, &base, "zip")?;
        fs::write(&path, bytes).map_err(|err| FeedbackError::storage(&path, err))?;
        debug!(folder = %target.folder.display(), bundle = %path.display(), "wrote bundle");
        written.push(path);
    }

    Ok(written)
}
