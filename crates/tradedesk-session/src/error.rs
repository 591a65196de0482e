//! Session and request error types.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// The auth backend operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    /// `POST /login`
    Login,
    /// `POST /register`
    Register,
    /// `POST /validate`
    Validate,
}

impl AuthOperation {
    /// Message shown when the backend gives no reason of its own.
    #[must_use]
    pub const fn generic_failure(self) -> &'static str {
        match self {
            Self::Login => "Login failed",
            Self::Register => "Registration failed",
            Self::Validate => "Token validation failed",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Register => f.write_str("register"),
            Self::Validate => f.write_str("validate"),
        }
    }
}

/// Errors returned by the auth backend client and the session manager.
///
/// The `Display` output is always a human-readable message suitable for
/// showing next to a login or registration form.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Rejected {
        /// Which call was rejected.
        operation: AuthOperation,
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// The backend's `message` field, or a generic fallback.
        message: String,
    },

    /// The backend could not be reached.
    #[error("{}", .operation.generic_failure())]
    Unreachable {
        /// Which call failed.
        operation: AuthOperation,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered 2xx with a body we cannot use.
    #[error("{}", .operation.generic_failure())]
    InvalidResponse {
        /// Which call failed.
        operation: AuthOperation,
        /// What was wrong with the body.
        detail: String,
    },
}

impl AuthError {
    /// The operation this error belongs to.
    #[must_use]
    pub const fn operation(&self) -> AuthOperation {
        match self {
            Self::Rejected { operation, .. }
            | Self::Unreachable { operation, .. }
            | Self::InvalidResponse { operation, .. } => *operation,
        }
    }

    /// The HTTP status, if the backend produced one.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Unreachable { .. } | Self::InvalidResponse { .. } => None,
        }
    }
}

/// Errors returned by the authorized (account-scoped) API client.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The backend answered 401; the session has already been torn down.
    #[error("unauthorized: {path}")]
    Unauthorized {
        /// Request path that was rejected.
        path: String,
    },

    /// The backend answered with another non-success status.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status.
        status: StatusCode,
        /// The backend's `message`/`error` field, or the status reason.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl RequestError {
    /// Returns `true` if this error ended the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
