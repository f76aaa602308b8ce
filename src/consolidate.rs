//! File Consolidator.
//!
//! Unifies two directories believed to hold the files of one entity. Every
//! relative path under the source is classified against the destination:
//!
//! - `UNIQUE_TO_SOURCE`: moved into the destination
//! - `IDENTICAL`: same size (and digest when verifying); the source copy is discarded
//! - `CONFLICT`: left in place and reported, never overwritten
//!
//! The source directory is removed only when every file was handled and no
//! conflict remains.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CanonryError, CanonryResult, ConsolidationError};

/// Classification of one relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileClass {
    /// Present only in the source; moved.
    UniqueToSource,
    /// Same size (and content when verified) in both; source copy removed.
    Identical,
    /// Same path, different content; both kept.
    Conflict,
}

/// How a conflict was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Waiting for a human; both copies are untouched.
    #[default]
    Unresolved,
}

/// A path present in both trees with different content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConflict {
    /// Path relative to both roots.
    pub relative_path: PathBuf,
    /// Size of the source copy.
    pub source_size: u64,
    /// Size of the destination copy, if it could be read.
    pub destination_size: Option<u64>,
    /// What differed.
    pub reason: String,
    /// Current state of the conflict.
    #[serde(default)]
    pub resolution: ConflictResolution,
}

/// One classified source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the source root.
    pub relative_path: PathBuf,
    /// How the file was classified.
    pub class: FileClass,
    /// Size in bytes.
    pub size: u64,
}

/// Machine-readable outcome of one consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// Folder being merged away.
    pub source: PathBuf,
    /// Folder receiving the files.
    pub destination: PathBuf,
    /// Every source file, classified.
    pub entries: Vec<FileEntry>,
    /// Files left in place for a human.
    pub conflicts: Vec<FileConflict>,
    /// True if the emptied source folder was deleted.
    pub source_removed: bool,
    /// True if nothing was moved or deleted.
    pub dry_run: bool,
}

impl ConsolidationReport {
    fn count(&self, class: FileClass) -> usize {
        self.entries.iter().filter(|e| e.class == class).count()
    }

    /// Files moved (or, in a dry run, that would be moved).
    #[must_use]
    pub fn moved(&self) -> usize {
        self.count(FileClass::UniqueToSource)
    }

    /// Files present identically in both trees.
    #[must_use]
    pub fn identical(&self) -> usize {
        self.count(FileClass::Identical)
    }

    /// Returns true if nothing needs a human.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Writes the report as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> CanonryResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self).map_err(CanonryError::serialization)?;
        fs::write(path, json).map_err(|e| CanonryError::io(path, e))
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ConsolidationError {
    let path = path.to_path_buf();
    move |source| ConsolidationError::Io { path, source }
}

fn digest(path: &Path) -> Result<blake3::Hash, ConsolidationError> {
    let mut file = File::open(path).map_err(io_err(path))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(io_err(path))?;
    Ok(hasher.finalize())
}

fn move_file(from: &Path, to: &Path) -> Result<(), ConsolidationError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves cannot rename.
    fs::copy(from, to).map_err(io_err(to))?;
    fs::remove_file(from).map_err(io_err(from))
}

/// Directory merger.
#[derive(Debug, Clone, Copy, Default)]
pub struct Consolidator {
    verify_content: bool,
    dry_run: bool,
}

impl Consolidator {
    /// Size-only comparison, changes applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compares BLAKE3 digests of equal-size files.
    #[must_use]
    pub const fn verify_content(mut self, verify: bool) -> Self {
        self.verify_content = verify;
        self
    }

    /// Classifies without touching the file system.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn check_roots(source: &Path, destination: &Path) -> Result<(PathBuf, PathBuf), ConsolidationError> {
        for dir in [source, destination] {
            if !dir.is_dir() {
                return Err(ConsolidationError::NotADirectory(dir.to_path_buf()));
            }
        }
        let source = fs::canonicalize(source).map_err(io_err(source))?;
        let destination = fs::canonicalize(destination).map_err(io_err(destination))?;
        if source == destination {
            return Err(ConsolidationError::SameDirectory(source));
        }
        if destination.starts_with(&source) {
            return Err(ConsolidationError::NestedDestination {
                source_dir: source,
                destination,
            });
        }
        Ok((source, destination))
    }

    /// Consolidates `source` into `destination`.
    ///
    /// # Errors
    /// - `NotADirectory`, `SameDirectory` or `NestedDestination` for bad roots
    /// - `Io` or `Walk` if the file system fails mid-way; files already moved
    ///   stay moved and the source is kept
    pub fn consolidate(&self, source: impl AsRef<Path>, destination: impl AsRef<Path>) -> CanonryResult<ConsolidationReport> {
        let (source, destination) = Self::check_roots(source.as_ref(), destination.as_ref())?;
        let mut report = ConsolidationReport {
            source: source.clone(),
            destination: destination.clone(),
            entries: Vec::new(),
            conflicts: Vec::new(),
            source_removed: false,
            dry_run: self.dry_run,
        };

        let walker = WalkDir::new(&source).min_depth(1).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| ConsolidationError::Walk {
                message: e.to_string(),
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&source)
                .map_err(|e| CanonryError::internal(e.to_string()))?
                .to_path_buf();
            let size = entry
                .metadata()
                .map_err(|e| ConsolidationError::Walk {
                    message: e.to_string(),
                })?
                .len();
            let class = self.handle(entry.path(), &destination.join(&relative), &relative, size, &mut report)?;
            report.entries.push(FileEntry {
                relative_path: relative,
                class,
                size,
            });
        }

        if report.is_clean() && !self.dry_run {
            report.source_removed = remove_empty_tree(&source)?;
        }

        info!(
            source = %report.source.display(),
            destination = %report.destination.display(),
            moved = report.moved(),
            identical = report.identical(),
            conflicts = report.conflicts.len(),
            source_removed = report.source_removed,
            dry_run = self.dry_run,
            "directories consolidated"
        );
        Ok(report)
    }

    fn handle(
        &self,
        from: &Path,
        to: &Path,
        relative: &Path,
        size: u64,
        report: &mut ConsolidationReport,
    ) -> Result<FileClass, ConsolidationError> {
        let mut conflict = |destination_size: Option<u64>, reason: String| {
            warn!(path = %relative.display(), %reason, "file conflict left for manual resolution");
            report.conflicts.push(FileConflict {
                relative_path: relative.to_path_buf(),
                source_size: size,
                destination_size,
                reason,
                resolution: ConflictResolution::Unresolved,
            });
            FileClass::Conflict
        };

        let Ok(existing) = fs::symlink_metadata(to) else {
            if !from.is_file() {
                return Ok(conflict(None, "source entry is not a regular file".to_string()));
            }
            if !self.dry_run {
                move_file(from, to)?;
            }
            debug!(path = %relative.display(), "moved unique file");
            return Ok(FileClass::UniqueToSource);
        };

        if !existing.is_file() {
            return Ok(conflict(None, "destination path is not a regular file".to_string()));
        }
        let destination_size = existing.len();
        if destination_size != size {
            return Ok(conflict(
                Some(destination_size),
                format!("size differs: source {size} bytes, destination {destination_size} bytes"),
            ));
        }
        if self.verify_content && digest(from)? != digest(to)? {
            return Ok(conflict(Some(destination_size), "content digest differs".to_string()));
        }
        if !self.dry_run {
            fs::remove_file(from).map_err(io_err(from))?;
        }
        Ok(FileClass::Identical)
    }
}

/// Removes a tree that should hold only directories by now.
///
/// Returns false, leaving the rest in place, if anything else is found.
fn remove_empty_tree(root: &Path) -> Result<bool, ConsolidationError> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| ConsolidationError::Walk {
            message: e.to_string(),
        })?;
        if !entry.file_type().is_dir() {
            warn!(path = %entry.path().display(), "unexpected entry left in source; keeping it");
            return Ok(false);
        }
        fs::remove_dir(entry.path()).map_err(io_err(entry.path()))?;
    }
    Ok(true)
}
