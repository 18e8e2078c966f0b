use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boundary checks so that resolved targets never leave the target root.
///
/// Catalog globs and symlinks inside a third-party install can point
/// anywhere; every resolved target is canonicalized and checked here before
/// the engine reads or writes it.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Canonical path to the target root
    root: PathBuf,
    /// Paths inside the root that must never be patched (backups, etc.)
    protected: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside target root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path is in protected directory: {path} (protected: {protected})")]
    Protected { path: PathBuf, protected: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl RootGuard {
    /// Create a guard for the given root.
    ///
    /// The root is canonicalized so symlinked installs compare correctly.
    /// `protected` entries are root-relative; ones that do not exist yet are
    /// still protected by their lexical path.
    pub fn new(root: impl AsRef<Path>, protected: &[String]) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        let protected = protected
            .iter()
            .map(|rel| {
                let joined = root.join(rel);
                joined.canonicalize().unwrap_or(joined)
            })
            .collect();

        Ok(Self { root, protected })
    }

    /// Check if a path is safe to patch.
    ///
    /// Returns the canonicalized absolute path if safe.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Cheap check for a path that may not exist, used while expanding globs.
    pub fn is_protected(&self, path: &Path) -> bool {
        self.protected.iter().any(|p| path.starts_with(p))
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }

        for protected in &self.protected {
            if canonical.starts_with(protected) {
                return Err(SafetyError::Protected {
                    path: canonical.to_path_buf(),
                    protected: protected.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
