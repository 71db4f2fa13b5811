//! Error types for arbor
//!
//! Errors are structured with fields to aid debugging in production.
//! Wait steps distinguish four failure kinds: transient lookup failures
//! (surfaced only through `Timeout::last_error`), terminal failures reported
//! by the awaited resource, deadline expiry, and external cancellation.

use std::time::Duration;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for arbor operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid configuration or arguments
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "vpnConnection.interval")
        field: Option<String>,
    },

    /// The awaited resource explicitly reported a failure; never retried
    #[error("{resource} failed: {message}")]
    Terminal {
        /// Resource that reported the failure (e.g., "backupinfrastructure garden-dev/shoot--dev--a--uid")
        resource: String,
        /// Failure description as reported by the resource
        message: String,
    },

    /// No ready or failed outcome was observed before the deadline
    #[error("timed out after {timeout:?} waiting for {operation}{}", last_error_suffix(.last_error))]
    Timeout {
        /// What was being waited for
        operation: String,
        /// The budget that elapsed
        timeout: Duration,
        /// Last transient error or pending reason observed before the deadline
        last_error: Option<String>,
    },

    /// The enclosing operation was cancelled while waiting
    #[error("cancelled while waiting for {operation}")]
    Cancelled {
        /// What was being waited for
        operation: String,
    },

    /// A later step asked for a fact an earlier step has not committed
    #[error("operation state field '{field}' is not available yet")]
    StateUnavailable {
        /// Name of the missing field
        field: String,
    },

    /// A lifecycle step failed; the sequence was aborted
    #[error("step {step} failed: {source}")]
    Step {
        /// Identifier of the step that failed
        step: String,
        /// Why it failed
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_client", "probe_pod_port")
        context: String,
    },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(": last error: {}", e),
        None => String::new(),
    }
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a terminal error for a resource that reported a failure
    pub fn terminal(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Terminal {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a deadline-exceeded error
    pub fn timeout(
        operation: impl Into<String>,
        timeout: Duration,
        last_error: Option<String>,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
            last_error,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an error for an unset operation state field
    pub fn state_unavailable(field: impl Into<String>) -> Self {
        Self::StateUnavailable {
            field: field.into(),
        }
    }

    /// Wrap an error with the identifier of the step it aborted
    pub fn step(step: impl Into<String>, source: Error) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    ///
    /// For simple internal errors without specific context.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// The innermost error, looking through step wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if this error is retryable by a higher-level reconcile loop
    ///
    /// Terminal, validation and cancellation errors are not retryable: the
    /// first needs the external system to change, the second a config fix,
    /// the third was requested. Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::Terminal { .. } => false,
            Error::Timeout { .. } => true,
            Error::Cancelled { .. } => false,
            Error::StateUnavailable { .. } => false,
            Error::Step { source, .. } => source.is_retryable(),
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// True if the root cause is an elapsed deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Error::Timeout { .. })
    }

    /// True if the root cause is an external cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled { .. })
    }

    /// True if the root cause is a failure reported by the awaited resource
    pub fn is_terminal(&self) -> bool {
        matches!(self.root_cause(), Error::Terminal { .. })
    }

    /// The step identifier if this error aborted a lifecycle step
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Error::Step { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
