//! Error types for the back office client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when calling the back office API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: StatusCode,
        /// The `error` field of the response body, when present.
        message: Option<String>,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Request URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// The server-reported `error` message, if the server sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// HTTP status of a server-reported error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Session and user-management operations.
///
/// Each operation has a fixed message used when the server gives no reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Register,
    UpdatePassword,
    CurrentUser,
    FetchUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ResetPassword,
}

impl Operation {
    /// Human-readable message shown when the server gives no reason.
    #[must_use]
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::Login => "Login failed",
            Self::Register => "Registration failed",
            Self::UpdatePassword => "Failed to update password",
            Self::CurrentUser => "Failed to fetch current user",
            Self::FetchUsers => "Failed to fetch users",
            Self::CreateUser => "Failed to create user",
            Self::UpdateUser => "Failed to update user",
            Self::DeleteUser => "Failed to delete user",
            Self::ResetPassword => "Failed to reset password",
        }
    }
}

/// A failed session operation carrying a message fit for display.
///
/// `Display` prints only the message: the server's `error` string when it
/// sent one, otherwise the operation's fallback.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OperationError {
    pub operation: Operation,
    pub message: String,
    #[source]
    pub source: ApiError,
}

impl OperationError {
    /// Wrap an API error, extracting the display message.
    #[must_use]
    pub fn new(operation: Operation, source: ApiError) -> Self {
        let message = source
            .server_message()
            .map_or_else(|| operation.fallback_message().to_owned(), str::to_owned);
        Self {
            operation,
            message,
            source,
        }
    }

    /// Closure form of [`OperationError::new`] for `map_err`.
    pub fn wrap(operation: Operation) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::new(operation, source)
    }
}

/// Errors from durable session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key contains characters that are not allowed.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A previous writer panicked while holding the lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}
