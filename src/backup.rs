//! One-time backups of target files before their first modification.
//!
//! A backup is taken only if none exists yet, so the copy always holds the
//! content from before the engine first touched the file, no matter how
//! many runs follow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created(PathBuf),
    AlreadyPresent(PathBuf),
}

impl BackupOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BackupOutcome::Created(p) | BackupOutcome::AlreadyPresent(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
    dir: PathBuf,
}

impl BackupStore {
    /// `dir` is relative to `root`.
    pub fn new(root: impl Into<PathBuf>, dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let dir = root.join(dir);
        Self { root, dir }
    }

    /// Backup location for `file`, mirroring its root-relative path.
    pub fn backup_path(&self, file: &Path) -> PathBuf {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        let relative = relative.strip_prefix("/").unwrap_or(relative);
        self.dir.join(relative)
    }

    /// Copy `file` into the backup directory unless a backup already exists.
    pub fn ensure(&self, file: &Path) -> io::Result<BackupOutcome> {
        let dest = self.backup_path(file);
        if dest.exists() {
            return Ok(BackupOutcome::AlreadyPresent(dest));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(file, &dest)?;
        tracing::info!(file = %file.display(), backup = %dest.display(), "backed up original");
        Ok(BackupOutcome::Created(dest))
    }
}
