use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every transformation the mutator performs compiles down to one or more of
/// these. Locating the span is the matcher's job; this type only guarantees
/// the span still holds what the matcher saw when the edit is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until it is applied"]
pub struct Edit {
    /// Path to the file to edit
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using a hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Overlapping edits at byte {byte_start} in {file}")]
    Overlap { file: PathBuf, byte_start: usize },

    #[error("Batch mixes files: {first} and {other}")]
    MixedFiles { first: PathBuf, other: PathBuf },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Edit does not fall on a UTF-8 character boundary")]
    InvalidUtf8Edit,
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// Edit was successfully applied
    Applied { file: PathBuf, bytes_changed: usize },
    /// Span already holds new_text
    AlreadyApplied { file: PathBuf },
}

impl EditResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditResult::Applied { .. })
    }
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Validate the edit against the current content.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation succeeds.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }

        let current_text = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::InvalidUtf8Edit)?;

        if current_text == self.new_text {
            return Ok(current_text);
        }

        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }

    /// Splice a set of edits for one file into `content`, in memory.
    ///
    /// Edits are validated against the original content, sorted by
    /// byte_start descending and applied bottom-to-top so earlier offsets
    /// stay valid. Results come back in that descending order.
    pub fn splice(
        content: &str,
        mut edits: Vec<Edit>,
    ) -> Result<(String, Vec<EditResult>), EditError> {
        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(content)?;
        }

        // Sorted descending: the lower edit must end before the higher one starts.
        // Two insertions at the same offset count as overlapping.
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start
                || (earlier.byte_start == later.byte_start && earlier.byte_end == later.byte_end)
            {
                return Err(EditError::Overlap {
                    file: later.file.clone(),
                    byte_start: later.byte_start,
                });
            }
        }

        let mut new_content = content.to_string();
        let mut results = Vec::with_capacity(edits.len());

        for edit in &edits {
            if &new_content[edit.byte_start..edit.byte_end] == edit.new_text {
                results.push(EditResult::AlreadyApplied {
                    file: edit.file.clone(),
                });
                continue;
            }

            new_content.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
            results.push(EditResult::Applied {
                file: edit.file.clone(),
                bytes_changed: edit.new_text.len(),
            });
        }

        Ok((new_content, results))
    }

    /// Apply several edits to the same file in one atomic write.
    ///
    /// The file is re-read here rather than trusting the caller's copy, so a
    /// change between matching and committing surfaces as a before-text
    /// mismatch instead of a corrupted splice.
    pub fn apply_batch(edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
        let Some(first) = edits.first() else {
            return Ok(Vec::new());
        };
        let file = first.file.clone();
        if let Some(other) = edits.iter().find(|e| e.file != file) {
            return Err(EditError::MixedFiles {
                first: file,
                other: other.file.clone(),
            });
        }

        let original = fs::read(&file)?;
        let original = std::str::from_utf8(&original)?;
        let (new_content, results) = Edit::splice(original, edits)?;

        if results.iter().any(EditResult::is_applied) {
            atomic_write(&file, new_content.as_bytes())?;

            // Bump mtime so the target's own build caches notice the change
            let now = filetime::FileTime::now();
            filetime::set_file_mtime(&file, now)?;
        }

        Ok(results)
    }
}

/// A fully written temp file waiting to be renamed over its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: tempfile::NamedTempFile,
}

impl StagedWrite {
    /// Path of the temp file holding the new content.
    #[cfg(test)]
    fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomic rename over the target.
    pub fn commit(self) -> Result<(), EditError> {
        self.temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Write `content` to a temp file next to `path` and fsync it, without
/// touching `path` yet.
///
/// The temp file lives in the same directory so the later rename stays on
/// one filesystem. Permissions of an existing target are carried over.
pub fn stage_write(path: &Path, content: &[u8]) -> Result<StagedWrite, EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    Ok(StagedWrite {
        target: path.to_path_buf(),
        temp,
    })
}

/// Atomic file write: tempfile + fsync + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    stage_write(path, content)?.commit()
}
