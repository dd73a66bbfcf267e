//! Back office HTTP API.
//!
//! The stores in this crate talk to the back end through two traits,
//! [`UserApi`] and [`SystemApi`]. [`ApiClient`] implements both over HTTP;
//! tests substitute in-memory fakes.
//!
//! # Endpoints
//!
//! | Operation | Method & path |
//! |---|---|
//! | login | `POST /api/login` |
//! | register | `POST /api/register` |
//! | current user | `GET /api/user` |
//! | logout | `POST /api/logout` |
//! | update password | `PUT /api/user/password` |
//! | list / create users | `GET` / `POST /api/admin/users` |
//! | update / delete user | `PUT` / `DELETE /api/admin/users/{id}` |
//! | reset password | `POST /api/admin/users/{id}/reset-password` |
//! | list / update options | `GET` / `PUT /api/admin/options` |
//! | get / update option | `GET` / `PUT /api/admin/options/{name}` |
//! | system info | `GET /api/sysinfo` |

mod auth;
mod client;

use std::future::Future;

use backoffice_core::{
    CreatedUser, Credentials, OptionEntry, OptionRecord, PasswordChange, PasswordReset,
    ServerMessage, SysInfo, User, UserId, UserUpdate,
};

use crate::error::ApiError;

pub use auth::BearerToken;
pub use client::ApiClient;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: BearerToken,
    pub user: User,
}

/// Authentication and user-management calls.
///
/// Every authenticated call takes the caller's token explicitly; `None`
/// sends the request without an `Authorization` header.
pub trait UserApi: Send + Sync {
    /// Exchange credentials for a token and the user record.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginGrant, ApiError>> + Send;

    /// Self-service registration.
    fn register(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<CreatedUser, ApiError>> + Send;

    /// The user the token belongs to.
    fn current_user(
        &self,
        token: Option<&BearerToken>,
    ) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// Tell the server the session is over.
    fn logout(
        &self,
        token: Option<&BearerToken>,
    ) -> impl Future<Output = Result<ServerMessage, ApiError>> + Send;

    fn update_password(
        &self,
        token: Option<&BearerToken>,
        change: &PasswordChange,
    ) -> impl Future<Output = Result<ServerMessage, ApiError>> + Send;

    fn list_users(
        &self,
        token: Option<&BearerToken>,
    ) -> impl Future<Output = Result<Vec<User>, ApiError>> + Send;

    fn create_user(
        &self,
        token: Option<&BearerToken>,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<CreatedUser, ApiError>> + Send;

    fn update_user(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
        update: &UserUpdate,
    ) -> impl Future<Output = Result<ServerMessage, ApiError>> + Send;

    fn delete_user(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
    ) -> impl Future<Output = Result<ServerMessage, ApiError>> + Send;

    fn reset_password(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
    ) -> impl Future<Output = Result<PasswordReset, ApiError>> + Send;
}

/// System settings calls.
pub trait SystemApi: Send + Sync {
    /// Public system info; needs no credentials.
    fn sys_info(&self) -> impl Future<Output = Result<SysInfo, ApiError>> + Send;

    /// Every option row (admin only).
    fn list_options(
        &self,
        token: Option<&BearerToken>,
    ) -> impl Future<Output = Result<Vec<OptionRecord>, ApiError>> + Send;

    /// A single option row by name (admin only).
    fn get_option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
    ) -> impl Future<Output = Result<OptionRecord, ApiError>> + Send;

    /// Persist a batch of options (admin only).
    fn update_options(
        &self,
        token: Option<&BearerToken>,
        options: &[OptionEntry],
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Overwrite the value of one existing option (admin only).
    fn update_option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
