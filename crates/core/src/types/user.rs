//! User records and user-management request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A user record as returned by the back end.
///
/// `is_admin` defaults to `false` when the server omits it, so a record
/// without the field never grants admin access on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Whether the user may access admin-only routes.
    #[serde(default)]
    pub is_admin: bool,
    /// Creation time (absent in login responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time (absent in login responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Username/password pair sent to login, register and create-user.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Plain-text password, sent over the wire only.
    pub password: String,
}

impl Credentials {
    /// Build a credentials body.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Partial user record for `PUT /api/admin/users/{id}`.
///
/// Fields left as `None` are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    /// New login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// New admin flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl UserUpdate {
    /// True when no field would be sent.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none() && self.is_admin.is_none()
    }
}

/// Body of `PUT /api/user/password`.
#[derive(Clone, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

/// Response of register and create-user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreatedUser {
    /// Human-readable confirmation from the server.
    #[serde(default)]
    pub message: Option<String>,
    /// The created record.
    #[serde(default)]
    pub user: Option<User>,
}

/// Plain acknowledgement returned by update, delete and logout calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `POST /api/admin/users/{id}/reset-password`.
///
/// The server answers with the temporary password it assigned.
#[derive(Clone, Default, Deserialize)]
pub struct PasswordReset {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordReset")
            .field("message", &self.message)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
