//! Error types for the trust admin client.
//!
//! # Design
//! Two disjoint failure families reach callers. `ValidationError` means a
//! value broke the schema contract, either before sending (caller input) or
//! after receiving (server output). `FetchError` means the HTTP exchange
//! itself failed; it is classified exactly once, from the status code, by the
//! transport. Callers branch on the `AdminError` tag and `FetchErrorKind`,
//! never on message text.

use thiserror::Error;

use crate::schema::ValidationIssue;

/// Result alias used by every `AdminClient` operation.
pub type Result<T, E = AdminError> = std::result::Result<T, E>;

/// Any failure returned by an `AdminClient` operation.
#[derive(Debug, Clone, Error)]
pub enum AdminError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl AdminError {
    pub fn as_fetch(&self) -> Option<&FetchError> {
        match self {
            AdminError::Fetch(err) => Some(err),
            AdminError::Validation(_) => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            AdminError::Validation(err) => Some(err),
            AdminError::Fetch(_) => None,
        }
    }
}

/// A value failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            message: message.into(),
            issues,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

/// Classification of a failed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// 4xx other than 401/403: the request itself was rejected.
    ClientError,
    /// 401 or 403.
    AuthError,
    /// 5xx.
    ServerError,
    /// No usable status: executor failure, unreadable body, bad JSON.
    UnknownError,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::ClientError => "client_error",
            FetchErrorKind::AuthError => "auth_error",
            FetchErrorKind::ServerError => "server_error",
            FetchErrorKind::UnknownError => "unknown_error",
        }
    }
}

const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Fixed status table. Statuses not listed fall back to their class.
fn classify(status: Option<u16>) -> (FetchErrorKind, &'static str) {
    use FetchErrorKind::*;
    match status {
        Some(400) => (ClientError, "Request is invalid."),
        Some(401) => (AuthError, "Authorization failed."),
        Some(403) => (AuthError, "Access is forbidden."),
        Some(404) => (ClientError, "Requested resource was not found."),
        Some(405) => (ClientError, "Method not allowed."),
        Some(409) => (ClientError, "Resource already exists."),
        Some(500) => (ServerError, "Internal server error."),
        Some(501) => (ServerError, "Requested functionality is not supported."),
        Some(502) => (ServerError, "Invalid response received from upstream server."),
        Some(503) => (ServerError, "Service unavailable."),
        Some(504) => (ServerError, "Gateway timeout: server did not respond in time."),
        Some(400..=499) => (ClientError, "Request failed."),
        Some(500..=599) => (ServerError, "Internal server error."),
        _ => (UnknownError, UNKNOWN_MESSAGE),
    }
}

/// A non-success HTTP outcome or a failure to complete the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Fetch error: {message}")]
pub struct FetchError {
    status: Option<u16>,
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    /// Builds an error from an HTTP status. A server supplied `message`
    /// replaces the table's default text but never changes the kind.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let (kind, default) = classify(Some(status));
        Self {
            status: Some(status),
            kind,
            message: message.unwrap_or_else(|| default.to_string()),
        }
    }

    /// Wraps a failure that produced no usable status.
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: None,
            kind: FetchErrorKind::UnknownError,
            message: if message.is_empty() {
                UNKNOWN_MESSAGE.to_string()
            } else {
                message
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FetchErrorKind::AuthError && self.status == Some(401)
    }
}
