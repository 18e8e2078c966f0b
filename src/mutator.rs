//! File mutator: one edit step against the current content of one file.
//!
//! Content always comes fresh from the [`TargetStore`], so chained steps in a
//! unit each observe the previous step's result. The store decides whether a
//! commit reaches disk ([`DiskStore`]) or stays in memory ([`ShadowStore`],
//! used for dry runs).

use crate::config::{Alternative, EditStep, Position};
use crate::edit::{Edit, EditError, EditResult};
use crate::matcher::{
    closest_line, find_match, DriftHint, Located, MatchSpec, MatcherError, Occurrences,
};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where target content is read from and edits are committed to.
pub trait TargetStore {
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Commit edits for a single file.
    fn commit(&mut self, edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError>;

    /// True when commits never reach disk.
    fn is_shadow(&self) -> bool {
        false
    }
}

/// Real filesystem, atomic writes.
#[derive(Debug, Default)]
pub struct DiskStore;

impl TargetStore for DiskStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn commit(&mut self, edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
        Edit::apply_batch(edits)
    }
}

/// In-memory overlay over the filesystem. Reads fall through to disk until
/// a file has been committed to.
#[derive(Debug, Default)]
pub struct ShadowStore {
    overlay: HashMap<PathBuf, String>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadowed content of a file, if it was committed to.
    pub fn shadowed(&self, path: &Path) -> Option<&str> {
        self.overlay.get(path).map(String::as_str)
    }
}

impl TargetStore for ShadowStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        match self.overlay.get(path) {
            Some(content) => Ok(content.clone()),
            None => fs::read_to_string(path),
        }
    }

    fn commit(&mut self, edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
        let Some(file) = edits.first().map(|e| e.file.clone()) else {
            return Ok(Vec::new());
        };
        let content = self.read(&file)?;
        let (new_content, results) = Edit::splice(&content, edits)?;
        self.overlay.insert(file, new_content);
        Ok(results)
    }

    fn is_shadow(&self) -> bool {
        true
    }
}

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("no alternative matched")]
    NoMatch { hint: Option<DriftHint> },

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error("write failed: {0}")]
    Edit(#[from] EditError),
}

/// What one successful edit step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Index of the alternative that matched
    pub alternative: usize,
    pub occurrences: usize,
    /// False when every occurrence already held the rendered text
    pub changed: bool,
}

/// Apply one edit step to `path`.
///
/// Reads current content, picks the first matching alternative, renders its
/// template at the chosen insertion point and commits through `store`.
pub fn apply_edit(
    store: &mut dyn TargetStore,
    path: &Path,
    step: &EditStep,
) -> Result<Mutation, MutationError> {
    let text = store.read(path).map_err(|source| MutationError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let occurrences = if step.replace_all {
        Occurrences::All
    } else {
        Occurrences::First
    };

    let Some(found) =
        find_match(&text, step.alternatives.iter().map(|a| &a.spec), occurrences)?
    else {
        return Err(MutationError::NoMatch {
            hint: drift_hint(&text, &step.alternatives),
        });
    };

    let alternative = found.spec_index;
    let chosen = &step.alternatives[alternative];
    let edits: Vec<Edit> = found
        .locations
        .iter()
        .map(|loc| build_edit(path, &text, chosen, loc))
        .collect();
    let count = edits.len();

    let results = store.commit(edits)?;
    let changed = results.iter().any(EditResult::is_applied);

    tracing::debug!(
        file = %path.display(),
        alternative,
        occurrences = count,
        changed,
        "edit step committed"
    );

    Ok(Mutation {
        alternative,
        occurrences: count,
        changed,
    })
}

fn build_edit(path: &Path, text: &str, alternative: &Alternative, loc: &Located<'_>) -> Edit {
    let rendered = loc.render(&alternative.replacement);
    let line_based = alternative.spec.is_line_based();

    let (start, end, new_text) = match alternative.position {
        Position::Replace => (loc.start, loc.end, rendered),
        Position::Before if line_based => {
            let eol = line_ending(text, loc.end);
            (loc.start, loc.start, format!("{rendered}{eol}"))
        }
        Position::Before => (loc.start, loc.start, rendered),
        Position::After if line_based => {
            let eol = line_ending(text, loc.end);
            if text[loc.end..].starts_with(eol) {
                // Land after the matched line's terminator, not inside it
                let at = loc.end + eol.len();
                (at, at, format!("{rendered}{eol}"))
            } else {
                (loc.end, loc.end, format!("{eol}{rendered}"))
            }
        }
        Position::After => (loc.end, loc.end, rendered),
    };

    Edit::new(path, start, end, new_text, &text[start..end])
}

/// Terminator of the line ending at `line_end`. The last line of a file has
/// none, so it borrows the file's convention.
fn line_ending(text: &str, line_end: usize) -> &'static str {
    let rest = &text[line_end..];
    if rest.starts_with("\r\n") {
        "\r\n"
    } else if rest.starts_with('\n') {
        "\n"
    } else if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Closest line to the primary non-regex alternative.
fn drift_hint(text: &str, alternatives: &[Alternative]) -> Option<DriftHint> {
    alternatives
        .iter()
        .map(|a| &a.spec)
        .find(|spec| !matches!(spec, MatchSpec::Regex { .. }))
        .and_then(|spec| closest_line(text, spec.pattern()))
}
