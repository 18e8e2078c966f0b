use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MatcherError {
    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("empty pattern")]
    EmptyPattern,
}
