//! Typed error taxonomy for the Relay client
//!
//! Callers always receive one of these variants, never a raw transport error.
//! Each variant carries a [`ErrorDetails`] record: a fixed set of well-known
//! optional fields plus one open key-value bag for extra diagnostics, so
//! calling code can branch on error kind without string-matching messages.

use relay_core_resilience::GuardError;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Structured context attached to every classified error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// HTTP status code, present for transport-origin errors.
    pub status_code: Option<u16>,
    /// Logical action that failed, e.g. `"raw_call"`.
    pub operation: Option<String>,
    /// Kind of resource involved, e.g. `"operation"`.
    pub resource_type: Option<String>,
    /// Identifier of the resource involved, e.g. the operation id.
    pub resource_id: Option<String>,
    /// Open bag for anything else relevant (template, parameter names, ...).
    pub context: BTreeMap<String, String>,
}

impl ErrorDetails {
    /// Details for a named logical operation.
    pub fn for_operation(operation: &str) -> Self {
        Self {
            operation: Some(operation.to_string()),
            ..Self::default()
        }
    }

    /// Attach the resource kind and id this error is about.
    pub fn resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Attach the originating HTTP status code.
    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Add one entry to the open context bag.
    pub fn context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Error type returned by all Relay client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client-side malformed request or a backend-reported validation failure
    /// (unknown operation id, missing/null path parameter, 422, field errors).
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: ErrorDetails,
    },

    /// The backend answered 404 for the requested resource.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        details: ErrorDetails,
    },

    /// The backend answered with a 5xx status.
    #[error("server error: {message}")]
    Server {
        message: String,
        details: ErrorDetails,
    },

    /// Catch-all for any other failing response, and for connection-level
    /// failures that never produced a status code.
    #[error("request failed: {message}")]
    Http {
        message: String,
        details: ErrorDetails,
    },

    /// A circuit breaker refused the call without contacting the backend.
    /// Distinct from [`ClientError::Http`] so monitoring can separate
    /// "backend is failing" from "breaker is protecting us".
    #[error("circuit open, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },
}

impl ClientError {
    /// Structured details, when this variant carries them.
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            ClientError::Validation { details, .. }
            | ClientError::NotFound { details, .. }
            | ClientError::Server { details, .. }
            | ClientError::Http { details, .. } => Some(details),
            ClientError::CircuitOpen { .. } => None,
        }
    }

    /// HTTP status code, when the error originated from a response.
    pub fn status_code(&self) -> Option<u16> {
        self.details().and_then(|d| d.status_code)
    }
}

/// Flatten a breaker-guarded result into the client taxonomy.
impl From<GuardError<ClientError>> for ClientError {
    fn from(err: GuardError<ClientError>) -> Self {
        match err {
            GuardError::Open { retry_after } => ClientError::CircuitOpen { retry_after },
            GuardError::Inner(e) => e,
        }
    }
}
