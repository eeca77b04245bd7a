//! Error types for the decision engine

use thiserror::Error;

/// A `Result` alias with [`DecisionError`] as the error type.
pub type Result<T> = std::result::Result<T, DecisionError>;

/// Errors raised while computing decisions
///
/// Unrecoverable run-level events reported by the service (a failed
/// schedule, a cancel request, ...) are not errors here. They are collected
/// by [`WorkflowHistory`](crate::WorkflowHistory) and handed to the workflow.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Workflow metadata or a prior result is not in the polled history.
    ///
    /// This happens when a long running workflow only polls part of its
    /// history. Callers should treat the value as unknown.
    #[error("state unavailable: {0}")]
    StateUnavailable(String),

    /// Output was requested in a state that has none.
    #[error("output unavailable for {action} in state {state}")]
    OutputUnavailable {
        /// Action description
        action: String,
        /// State the action was in
        state: String,
    },

    /// An action or retry policy was configured incorrectly.
    #[error("unconfigured action: {0}")]
    UnconfiguredAction(String),

    /// The newest event of an action chain has a state no action can be in.
    ///
    /// Indicates a mismatch between the event model and the service.
    #[error("unknown action state for {action}: {state}")]
    UnknownActionState {
        /// Action description
        action: String,
        /// Event state that could not be mapped
        state: String,
    },

    /// The control-flow builder stack did not line up.
    #[error("unbalanced control flow: {0}")]
    UnbalancedFlow(String),

    /// Workflow type was not registered.
    #[error("unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    /// A decision task carried more history than allowed.
    #[error("workflow {workflow_id} has too many events ({count} > {max})")]
    TooManyEvents {
        /// Workflow id of the decision task
        workflow_id: String,
        /// Number of events received
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DecisionError {
    /// Create a state unavailable error
    pub fn state_unavailable(message: impl Into<String>) -> Self {
        Self::StateUnavailable(message.into())
    }

    /// Create an unconfigured action error
    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::UnconfiguredAction(message.into())
    }

    /// Whether the caller can carry on treating the value as unknown
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StateUnavailable(_))
    }
}
