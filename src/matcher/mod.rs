//! Text matching for patch alternatives.
//!
//! Matching is purely textual: literal substrings, regular expressions,
//! whole lines and whitespace-tolerant blocks. Each kind is a [`Strategy`];
//! a list of [`MatchSpec`]s is evaluated in declaration order and the first
//! one that matches wins, so catalog order encodes author confidence.

pub mod errors;
pub mod finder;
pub mod hint;
pub mod spec;

pub use errors::MatcherError;
pub use finder::{find_match, Located, MatchResult, Occurrences};
pub use hint::{closest_line, DriftHint};
pub use spec::{MatchSpec, Strategy};
