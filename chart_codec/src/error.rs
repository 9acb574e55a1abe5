use chart_model::Ticks;
use thiserror::Error;

/// Grammar-level failure detail carried inside [`DecodeError::MalformedEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("missing '=' separator")]
    MissingSeparator,
    #[error("missing type code after '='")]
    MissingType,
    #[error("invalid integer in {field}")]
    BadInteger { field: &'static str },
    #[error("invalid float in {field}")]
    BadFloat { field: &'static str },
    #[error("time signature denominator exponent {0} out of range")]
    BadDenominator(u32),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed entry in [{section}]: {cause} (entry: {line:?})")]
    MalformedEntry {
        section: String,
        line: String,
        cause: EntryError,
    },

    #[error("section [{section}] ended without its closing marker")]
    UnterminatedSection { section: String },

    #[error("duplicate {detail} at position {position} in [{section}]")]
    DuplicateObject {
        section: String,
        position: Ticks,
        detail: String,
    },

    #[error(
        "special phrases overlap at position {position} in [{section}]; \
         OverlapPolicy::Cut shortens the earlier phrase instead"
    )]
    OverlappingPhrase { section: String, position: Ticks },

    #[error("decoder result queried before finalization")]
    ResultNotReady,

    #[error("decode worker terminated unexpectedly: {0}")]
    Worker(String),

    #[error("failed to read input")]
    Io(#[from] std::io::Error),

    #[error("malformed midi container: {0}")]
    Midi(#[from] midly::Error),
}

impl DecodeError {
    pub(crate) fn malformed(section: &str, line: &str, cause: EntryError) -> Self {
        Self::MalformedEntry {
            section: section.to_string(),
            line: line.to_string(),
            cause,
        }
    }
}
