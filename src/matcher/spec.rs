use crate::cache;
use crate::matcher::errors::MatcherError;
use crate::matcher::finder::Located;
use regex::Regex;
use serde::Deserialize;

/// One candidate way to locate an edit point.
///
/// # Kinds
///
/// - `literal` - exact substring
/// - `regex` - regular expression; captures feed the replacement template
/// - `line` - a whole line whose trimmed content equals the pattern
/// - `block` - consecutive lines equal to the pattern's lines, each compared
///   with surrounding whitespace ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatchSpec {
    Literal { pattern: String },
    Regex { pattern: String },
    Line { pattern: String },
    Block { pattern: String },
}

impl MatchSpec {
    pub fn literal(pattern: impl Into<String>) -> Self {
        MatchSpec::Literal {
            pattern: pattern.into(),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        MatchSpec::Regex {
            pattern: pattern.into(),
        }
    }

    pub fn line(pattern: impl Into<String>) -> Self {
        MatchSpec::Line {
            pattern: pattern.into(),
        }
    }

    pub fn block(pattern: impl Into<String>) -> Self {
        MatchSpec::Block {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            MatchSpec::Literal { pattern }
            | MatchSpec::Regex { pattern }
            | MatchSpec::Line { pattern }
            | MatchSpec::Block { pattern } => pattern,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MatchSpec::Literal { .. } => "literal",
            MatchSpec::Regex { .. } => "regex",
            MatchSpec::Line { .. } => "line",
            MatchSpec::Block { .. } => "block",
        }
    }

    /// Line-granular kinds insert before/after text on its own line.
    pub fn is_line_based(&self) -> bool {
        matches!(self, MatchSpec::Line { .. } | MatchSpec::Block { .. })
    }

    /// Build the strategy object for this spec.
    pub fn strategy(&self) -> Result<Box<dyn Strategy + '_>, MatcherError> {
        if self.pattern().trim().is_empty() {
            return Err(MatcherError::EmptyPattern);
        }
        Ok(match self {
            MatchSpec::Literal { pattern } => Box::new(Literal(pattern)),
            MatchSpec::Regex { pattern } => Box::new(Pattern(compile(pattern)?)),
            MatchSpec::Line { pattern } => Box::new(AnchoredLine(pattern.trim())),
            MatchSpec::Block { pattern } => Box::new(Block::new(pattern)),
        })
    }

    /// Compile-check the spec without matching anything.
    pub fn check(&self) -> Result<(), MatcherError> {
        self.strategy().map(|_| ())
    }

    /// Whether the spec matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> Result<bool, MatcherError> {
        Ok(self.strategy()?.find_first(text).is_some())
    }
}

fn compile(pattern: &str) -> Result<Regex, MatcherError> {
    cache::get_or_compile(pattern).map_err(|e| MatcherError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// A way of locating text. Implementations never mutate their input.
pub trait Strategy {
    /// First occurrence in `text`.
    fn find_first<'t>(&self, text: &'t str) -> Option<Located<'t>>;

    /// All non-overlapping occurrences, in order.
    fn find_all<'t>(&self, text: &'t str) -> Vec<Located<'t>>;
}

struct Literal<'p>(&'p str);

impl Strategy for Literal<'_> {
    fn find_first<'t>(&self, text: &'t str) -> Option<Located<'t>> {
        text.find(self.0)
            .map(|start| Located::span(start, start + self.0.len()))
    }

    fn find_all<'t>(&self, text: &'t str) -> Vec<Located<'t>> {
        text.match_indices(self.0)
            .map(|(start, m)| Located::span(start, start + m.len()))
            .collect()
    }
}

struct Pattern(Regex);

impl Strategy for Pattern {
    fn find_first<'t>(&self, text: &'t str) -> Option<Located<'t>> {
        self.0.captures(text).map(Located::from_captures)
    }

    fn find_all<'t>(&self, text: &'t str) -> Vec<Located<'t>> {
        self.0.captures_iter(text).map(Located::from_captures).collect()
    }
}

/// Lines of `text` as (byte offset, content without line terminator).
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let start = offset;
            offset += raw.len();
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            let line = line.strip_suffix('\r').unwrap_or(line);
            (start, line)
        })
        .collect()
}

struct AnchoredLine<'p>(&'p str);

impl AnchoredLine<'_> {
    fn scan<'t>(&self, text: &'t str, all: bool) -> Vec<Located<'t>> {
        let mut found = Vec::new();
        for (start, line) in lines_with_offsets(text) {
            if line.trim() == self.0 {
                found.push(Located::span(start, start + line.len()));
                if !all {
                    break;
                }
            }
        }
        found
    }
}

impl Strategy for AnchoredLine<'_> {
    fn find_first<'t>(&self, text: &'t str) -> Option<Located<'t>> {
        self.scan(text, false).into_iter().next()
    }

    fn find_all<'t>(&self, text: &'t str) -> Vec<Located<'t>> {
        self.scan(text, true)
    }
}

struct Block<'p> {
    lines: Vec<&'p str>,
}

impl<'p> Block<'p> {
    fn new(pattern: &'p str) -> Self {
        let mut lines: Vec<&str> = pattern.lines().map(str::trim).collect();
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self { lines }
    }

    fn scan<'t>(&self, text: &'t str, all: bool) -> Vec<Located<'t>> {
        let n = self.lines.len();
        let text_lines = lines_with_offsets(text);
        let mut found = Vec::new();
        if n == 0 || text_lines.len() < n {
            return found;
        }

        let mut i = 0;
        while i + n <= text_lines.len() {
            let window = &text_lines[i..i + n];
            let hit = window
                .iter()
                .zip(&self.lines)
                .all(|((_, line), want)| line.trim() == *want);
            if hit {
                let (start, _) = window[0];
                let (last_start, last_line) = window[n - 1];
                found.push(Located::span(start, last_start + last_line.len()));
                if !all {
                    break;
                }
                i += n;
            } else {
                i += 1;
            }
        }
        found
    }
}

impl Strategy for Block<'_> {
    fn find_first<'t>(&self, text: &'t str) -> Option<Located<'t>> {
        self.scan(text, false).into_iter().next()
    }

    fn find_all<'t>(&self, text: &'t str) -> Vec<Located<'t>> {
        self.scan(text, true)
    }
}
