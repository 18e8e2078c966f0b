//! Drift hints for alternatives that no longer match.
//!
//! When upstream rewords a line, the closest surviving line is usually the
//! one the catalog author needs to look at. Minified bundles produce
//! enormous lines, so only reasonably sized lines are compared.

use std::fmt;
use strsim::normalized_levenshtein;

const MIN_SIMILARITY: f64 = 0.6;
const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct DriftHint {
    /// 1-based line number
    pub line: usize,
    pub similarity: f64,
    pub text: String,
}

impl fmt::Display for DriftHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "closest line {} ({:.0}% similar): {}",
            self.line,
            self.similarity * 100.0,
            self.text
        )
    }
}

/// Find the line of `text` most similar to the first non-blank line of `pattern`.
pub fn closest_line(text: &str, pattern: &str) -> Option<DriftHint> {
    let needle = pattern.lines().map(str::trim).find(|l| !l.is_empty())?;
    if needle.len() > MAX_LINE_LEN {
        return None;
    }

    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .filter(|(_, line)| !line.is_empty() && line.len() <= MAX_LINE_LEN)
        .map(|(idx, line)| (idx, line, normalized_levenshtein(needle, line)))
        .filter(|(_, _, score)| *score >= MIN_SIMILARITY)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(idx, line, similarity)| DriftHint {
            line: idx + 1,
            similarity,
            text: line.to_string(),
        })
}
