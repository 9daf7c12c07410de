//! Error types for the dialog runtime
//!
//! Domain errors use thiserror; host callbacks and the CLI work in anyhow and
//! convert at the body boundary (see [`RuntimeError::from_body`]).

use thiserror::Error;

use super::scope::ScopeId;
use crate::interpreter::value::ValueTag;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An action signature could not be accepted at declaration time
    #[error("Schema violation in '{action}': {detail}")]
    SchemaViolation {
        /// Signature text or action name being declared
        action: String,
        /// What was wrong with it
        detail: String,
    },

    /// Identifier not present in the combined registry
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    /// Argument count, keyword or tag mismatch
    #[error("Argument contract violated for '{action}': {detail}")]
    ArgumentContract {
        /// Action being invoked
        action: String,
        /// Description of the mismatch
        detail: String,
    },

    /// Malformed action expression text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Action produced a value outside its declared return contract
    #[error("Action '{action}' returned {found}, expected {expected}")]
    ReturnContract {
        /// Action that produced the value
        action: String,
        /// Declared return tag (or `none`)
        expected: String,
        /// Tag of the produced value
        found: String,
    },

    /// A host-supplied body failed
    #[error("Action '{action}' failed: {source}")]
    ActionFailed {
        /// Action whose body failed
        action: String,
        /// Underlying host error
        #[source]
        source: anyhow::Error,
    },

    /// Entering another scope would exceed the configured depth
    #[error("Scope depth limit of {0} exceeded")]
    ScopeDepthExceeded(usize),

    /// `resume` called while no task is waiting for input
    #[error("No dialog is waiting for input")]
    NoActiveDialog,

    /// Operation requires an idle runtime
    #[error("A dialog is already running")]
    DialogActive,

    /// Inspection requested for something that is not a task
    #[error("'{0}' is not an interactive task")]
    NotATask(String),

    /// The scope being left is not the top of the stack
    #[error("Scope violation: expected {expected} on top of the stack, found {found:?}")]
    ScopeViolation {
        /// Scope the caller tried to leave
        expected: ScopeId,
        /// Actual top of the stack
        found: Option<ScopeId>,
    },

    /// Exit signal names a scope that is not on the stack
    #[error("Exit signal targets scope {0}, which is not active")]
    DanglingExit(ScopeId),

    /// The unit stack reached a state the dispatcher cannot continue from
    #[error("Internal dispatch error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the dialog can carry on at the same prompt after this error.
    ///
    /// Structural violations mean the stack discipline is broken and the
    /// dialog run must be aborted.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RuntimeError::SchemaViolation { .. }
                | RuntimeError::ScopeViolation { .. }
                | RuntimeError::DanglingExit(_)
                | RuntimeError::Internal(_)
        )
    }

    /// Convert an error returned by an action body.
    pub(crate) fn from_body(action: &str, error: anyhow::Error) -> Self {
        match error.downcast::<RuntimeError>() {
            Ok(inner) => inner,
            Err(source) => RuntimeError::ActionFailed {
                action: action.to_string(),
                source,
            },
        }
    }

    pub(crate) fn schema(action: impl Into<String>, detail: impl Into<String>) -> Self {
        RuntimeError::SchemaViolation {
            action: action.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn contract(action: impl Into<String>, detail: impl Into<String>) -> Self {
        RuntimeError::ArgumentContract {
            action: action.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn returned(
        action: &str,
        expected: Option<ValueTag>,
        found: Option<ValueTag>,
    ) -> Self {
        let describe = |tag: Option<ValueTag>| match tag {
            Some(tag) => tag.to_string(),
            None => "none".to_string(),
        };
        RuntimeError::ReturnContract {
            action: action.to_string(),
            expected: describe(expected),
            found: describe(found),
        }
    }
}

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;
