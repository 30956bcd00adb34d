//! Error taxonomy shared across the pipeline.

use thiserror::Error;

/// Errors surfaced by pipeline activities and services.
///
/// The workflow retry policy dispatches on [`BinderyError::is_transient`]:
/// transient failures are retried with backoff, everything else fails the
/// activity (and, unless the caller degrades, the stage).
#[derive(Debug, Error)]
pub enum BinderyError {
    /// Recoverable I/O failure (network, rate limit, deadlock). Retried.
    #[error("transient failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// The model returned output that could not be parsed as the requested
    /// schema. The owning section degrades to an empty result.
    #[error("malformed model output: {0}")]
    MalformedLlm(String),

    /// A domain invariant does not hold (impossible page count, overlapping
    /// manifest sets). Fatal to the workflow.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An input item does not match the schema a consumer expects. The item
    /// is skipped and a warning event emitted.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A referenced row does not exist. Fatal with a descriptive message.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// An external service rejected the call for a non-transient reason
    /// (bad credentials, unknown model, invalid request).
    #[error("service error: {0}")]
    Service(String),

    /// Row or payload encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The surrounding workflow was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl BinderyError {
    /// Whether the retry policy should re-attempt the failed call.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Wraps an arbitrary error as transient.
    #[must_use]
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }
}

impl From<serde_json::Error> for BinderyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BinderyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(BinderyError::transient(anyhow::anyhow!("socket reset")).is_transient());
        assert!(!BinderyError::NotFound("doc".into()).is_transient());
        assert!(!BinderyError::MalformedLlm("not json".into()).is_transient());
    }
}
