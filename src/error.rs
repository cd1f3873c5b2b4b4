//! Error types for the planner.

/// Everything that can go wrong while scheduling, journalling or refreshing.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// An alarm with this title is already pending.
    #[error("alarm with title {0:?} already exists")]
    DuplicateTitle(String),

    /// The title contains the journal field delimiter.
    #[error("\" ^ \" is a reserved pattern, cannot use it in title {0:?}")]
    ReservedToken(String),

    /// The alarm time could not be parsed or is not in the future.
    #[error("invalid alarm time {0:?}")]
    InvalidTime(String),

    /// No pending alarm or active notification carries this title.
    #[error("nothing titled {0:?}")]
    NotFound(String),

    /// The journal cannot be replayed.
    #[error("malformed journal at line {line}: {reason}")]
    MalformedLog { line: usize, reason: String },

    /// An upstream provider failed or answered with an error status.
    #[error("upstream {0} unavailable")]
    UpstreamUnavailable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlannerError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedLog {
            line,
            reason: reason.into(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PlannerError>;
