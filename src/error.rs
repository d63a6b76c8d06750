use thiserror::Error;

use crate::core::TaskId;

/// A malformed operation spec. These are programming defects in the way a
/// spec was assembled, never transient failures, and must not be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("operation spec has no request kind populated")]
    NoRequest,

    #[error("operation spec has more than one request kind populated: {0}")]
    ConflictingRequests(String),

    #[error("expected a '{expected}' response but the client returned a '{actual}' response")]
    ResponseMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("Malformed operation spec: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Couldn't initialize the external client.\n{0}")]
    ClientInit(anyhow::Error),

    #[error("External system call failed.\n{0}")]
    External(anyhow::Error),

    #[error("Couldn't shape the external result.\n{0}")]
    Transform(anyhow::Error),
}

impl OperatorError {
    /// Whether this failure is a defect in spec construction rather than
    /// something that happened in the external system.
    pub fn is_defect(&self) -> bool {
        matches!(self, OperatorError::Definition(_))
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Couldn't force an input of '{id}'.\n{source}")]
    Input { id: TaskId, source: anyhow::Error },

    #[error("Dependency cycle detected at '{0}'")]
    Cycle(String),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Couldn't force an input of '{id}'.\n{source}")]
    Input { id: TaskId, source: anyhow::Error },

    #[error("Task '{id}' failed.\n{source}")]
    Compute { id: TaskId, source: anyhow::Error },

    #[error("Operator for task '{id}' failed.\n{source}")]
    Operator { id: TaskId, source: OperatorError },

    #[error("Expected an output of type '{expected}'")]
    TypeMismatch { expected: &'static str },

    #[error("Task '{0}' depends on itself")]
    Cycle(TaskId),
}
