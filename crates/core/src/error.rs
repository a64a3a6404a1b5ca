use thiserror::Error;

/// Fatal failures of a repackaging invocation.
///
/// Everything here aborts the build. Soft minimization failures are not
/// errors; they are reported through `tracing::warn!` and the affected
/// entry is conservatively kept.
#[derive(Debug, Error)]
pub enum RepackError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot resolve input '{input}': {reason}")]
    Resolution { input: String, reason: String },
    #[error("conflicting content for '{path}' (from {first} and {second})")]
    Conflict {
        path: String,
        first: String,
        second: String,
    },
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl RepackError {
    pub fn resolution(input: impl Into<String>, reason: impl ToString) -> Self {
        RepackError::Resolution {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepackError>;
