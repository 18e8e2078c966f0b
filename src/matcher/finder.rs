use crate::matcher::errors::MatcherError;
use crate::matcher::spec::MatchSpec;
use regex::Captures;

/// A located occurrence, with regex captures when the spec produced them.
#[derive(Debug)]
pub struct Located<'t> {
    /// Byte range of the occurrence
    pub start: usize,
    pub end: usize,
    captures: Option<Captures<'t>>,
}

impl<'t> Located<'t> {
    pub(crate) fn span(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            captures: None,
        }
    }

    pub(crate) fn from_captures(captures: Captures<'t>) -> Self {
        let whole = captures.get(0).expect("capture group 0 always participates");
        Self {
            start: whole.start(),
            end: whole.end(),
            captures: Some(captures),
        }
    }

    /// Render a replacement template for this occurrence.
    ///
    /// Regex occurrences expand `$1`, `${1}`, `${name}` and `$$`; every other
    /// kind inserts the template verbatim, so literal templates may contain
    /// `${...}` freely.
    pub fn render(&self, template: &str) -> String {
        match &self.captures {
            Some(caps) => {
                let mut out = String::with_capacity(template.len());
                caps.expand(template, &mut out);
                out
            }
            None => template.to_string(),
        }
    }
}

/// How many occurrences of the winning spec to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrences {
    First,
    All,
}

/// The first spec that matched, and where.
#[derive(Debug)]
pub struct MatchResult<'t> {
    /// Index of the spec that matched; > 0 means a fallback was used
    pub spec_index: usize,
    /// Never empty
    pub locations: Vec<Located<'t>>,
}

impl<'t> MatchResult<'t> {
    pub fn is_fallback(&self) -> bool {
        self.spec_index > 0
    }

    pub fn first(&self) -> &Located<'t> {
        &self.locations[0]
    }
}

/// Return the first spec (in declaration order) that matches `text`.
///
/// First match, not best match: a later spec is only consulted when every
/// earlier one found nothing. An invalid spec aborts the search rather than
/// being skipped, since silently falling through would hide catalog errors.
pub fn find_match<'s, 't>(
    text: &'t str,
    specs: impl IntoIterator<Item = &'s MatchSpec>,
    occurrences: Occurrences,
) -> Result<Option<MatchResult<'t>>, MatcherError> {
    for (spec_index, spec) in specs.into_iter().enumerate() {
        let strategy = spec.strategy()?;
        let locations = match occurrences {
            Occurrences::First => strategy.find_first(text).into_iter().collect(),
            Occurrences::All => strategy.find_all(text),
        };
        if !locations.is_empty() {
            tracing::debug!(spec_index, kind = spec.kind(), "match spec succeeded");
            return Ok(Some(MatchResult {
                spec_index,
                locations,
            }));
        }
    }
    Ok(None)
}
