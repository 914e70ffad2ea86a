//! Error taxonomy for the turn pipeline.
//!
//! Every component returns one of these kinds; the orchestrator is the only
//! place that maps a kind to a retry/degrade policy.

use thiserror::Error;

/// Structured error kinds a pipeline component can raise.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// LLM or store I/O failure expected to succeed on retry.
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    /// Structured-output parse failure.
    #[error("malformed LLM output: {0}")]
    MalformedLlmOutput(String),

    /// Reference to a key not in the manifest.
    #[error("grounding violation: unknown key {0:?}")]
    GroundingViolation(String),

    /// Contradictory deltas in one batch.
    #[error("semantic conflict: {0}")]
    SemanticConflict(String),

    /// `UPDATE_LOCATION` to a non-manifest location.
    #[error("destination hallucination: {0:?} is not a manifest exit or candidate location")]
    DestinationHallucination(String),

    /// Missing or bad `[key:display]` refs, tool commentary.
    #[error("narrative format violation: {0}")]
    NarrativeFormatViolation(String),

    /// Commit failed.
    #[error("store transaction error: {0}")]
    StoreTransactionError(String),

    /// Not an error; diverts to the OOC handler.
    #[error("out-of-character query")]
    OocQuery,

    /// Impossible invariants (e.g. corrupt manifest).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PipelineError {
    /// Whether the orchestrator's retry ladder should reattempt the call
    /// that produced this error, or give up and degrade the turn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientUpstream(_))
    }

    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            Self::GroundingViolation(_) | Self::MalformedLlmOutput(_)
        )
    }
}

/// Errors raised by the domain-store ports (`EntityStore`, `InventoryStore`, ...).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{entity_type} not found: {key}")]
    NotFound { entity_type: &'static str, key: String },

    #[error("store I/O failure in {operation}: {message}")]
    Io { operation: &'static str, message: String },

    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl StoreError {
    pub fn not_found(entity_type: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            key: key.into(),
        }
    }

    pub fn io(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Io {
            operation,
            message: message.into(),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { .. } => PipelineError::TransientUpstream(err.to_string()),
            StoreError::NotFound { .. } | StoreError::Constraint(_) => {
                PipelineError::StoreTransactionError(err.to_string())
            }
        }
    }
}

/// Errors raised by the `LLMClient` port.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RequestFailed(msg) => PipelineError::TransientUpstream(msg),
            LlmError::InvalidResponse(msg) => PipelineError::MalformedLlmOutput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_upstream_is_retryable() {
        assert!(PipelineError::TransientUpstream("timeout".into()).is_retryable());
        assert!(!PipelineError::Fatal("corrupt manifest".into()).is_retryable());
    }

    #[test]
    fn grounding_and_malformed_are_locally_recoverable() {
        assert!(PipelineError::GroundingViolation("x".into()).is_locally_recoverable());
        assert!(PipelineError::MalformedLlmOutput("x".into()).is_locally_recoverable());
        assert!(!PipelineError::DestinationHallucination("x".into()).is_locally_recoverable());
    }

    #[test]
    fn store_io_error_promotes_to_transient_upstream() {
        let store_err = StoreError::io("get_by_key", "connection reset");
        let pipeline_err: PipelineError = store_err.into();
        assert!(matches!(pipeline_err, PipelineError::TransientUpstream(_)));
    }
}
