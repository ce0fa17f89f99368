use thiserror::Error;

/// ValidationError describes a rejected metric, tag or import line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {what} (\"{value}\"): {reason}")]
    InvalidString {
        what: String,
        value: String,
        reason: String,
    },

    #[error("need at least one tag (metric={0})")]
    NoTags(String),

    #[error("too many tags: {count} maximum allowed: {max}")]
    TooManyTags { count: usize, max: usize },

    #[error("duplicate tag key: {0}")]
    DuplicateTag(String),

    #[error("invalid tag \"{0}\": expected tagk=tagv")]
    MalformedTag(String),

    #[error("malformed line: {0}")]
    MalformedLine(String),
}
