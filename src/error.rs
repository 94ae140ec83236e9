//! Error types for agentflow.
//!
//! All errors are represented by the `FlowError` enum. Node-level failures are
//! recorded on execution records and never escape the engine's public API; the
//! variants here surface request-level problems (bad definitions, unknown ids,
//! admission, storage) and carry node failures internally between the node
//! runner and the scheduler.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all agentflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// Engine-level errors (startup, shutdown, not running).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Malformed flow definition: dangling edge, cycle, unknown node type,
    /// invalid node parameters. Detected before an execution is created.
    #[error("invalid flow definition: {0}")]
    Validation(String),

    /// A `${...}` template could not be resolved against the execution context.
    #[error("{0}")]
    Resolution(String),

    /// A capability call failed.
    #[error("{message}")]
    Invocation {
        message: String,
        retryable: bool,
    },

    /// The flow-level timeout elapsed.
    #[error("flow execution timed out after {0} seconds")]
    Timeout(u64),

    /// The execution was stopped by the caller.
    #[error("execution cancelled: {0}")]
    Cancelled(String),

    /// Execution lookup and lifecycle errors.
    #[error("{0}")]
    Execution(String),

    /// The flow already runs `max_concurrent_executions` executions.
    #[error("{0}")]
    Admission(String),

    /// Local action errors.
    #[error("{0}")]
    Action(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl FlowError {
    /// Whether the node runner may retry after this error.
    ///
    /// Resolution errors are never retried since the missing context will not
    /// appear on a second attempt; invocation errors carry their own flag and
    /// everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlowError::Resolution(_) | FlowError::Validation(_) | FlowError::Cancelled(_) | FlowError::Timeout(_) => false,
            FlowError::Invocation {
                retryable, ..
            } => *retryable,
            _ => true,
        }
    }
}

impl From<FlowError> for String {
    fn from(val: FlowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowError {
    fn from(error: std::io::Error) -> Self {
        FlowError::IoError(error.to_string())
    }
}

impl From<FlowError> for std::io::Error {
    fn from(val: FlowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for FlowError {
    fn from(_: FromUtf8Error) -> Self {
        FlowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::Convert(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for FlowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        FlowError::Validation(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!FlowError::Resolution("missing".into()).is_retryable());
        assert!(!FlowError::Invocation {
            message: "bad input".into(),
            retryable: false,
        }
        .is_retryable());
        assert!(FlowError::Invocation {
            message: "io".into(),
            retryable: true,
        }
        .is_retryable());
        assert!(FlowError::Action("boom".into()).is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(FlowError::Timeout(5).to_string(), "flow execution timed out after 5 seconds");
    }
}
