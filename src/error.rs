//! Error types for answer parsing and rule configuration.

/// An answer value outside the supported text / multi-select / rating shapes.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("unsupported answer shape: {0}")]
    UnsupportedShape(String),

    #[error("rating {0} is outside 1..=5")]
    RatingOutOfRange(i64),

    #[error("rating is not an integer: {0:?}")]
    InvalidRating(String),

    #[error("unknown answer kind: {0:?} (expected text, multi or rating)")]
    UnknownKind(String),
}

#[derive(Debug, thiserror::Error)]
#[error("unknown market segment: {0:?}")]
pub struct UnknownSegment(pub String);

/// Rule table loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to read rule table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rule table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("segment {0} appears more than once in the rule table")]
    DuplicateSegment(String),

    #[error("segment {segment} has invalid weight {weight}")]
    InvalidWeight { segment: String, weight: f64 },

    #[error("segment {0} has no factors")]
    NoFactors(String),
}
