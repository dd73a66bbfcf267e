//! Persisted session store.
//!
//! Holds the bearer token and the logged-in user, mirrors both to durable
//! [`Storage`], and forwards user-management calls with the session's token.
//!
//! # Lifecycle
//!
//! 1. [`SessionStore::restore`] reads `token` and `user` from storage at start
//! 2. [`SessionStore::login`] replaces both on success
//! 3. [`SessionStore::logout`] clears memory and storage

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use backoffice_core::{
    CreatedUser, Credentials, PasswordChange, PasswordReset, ServerMessage, User, UserId,
    UserUpdate,
};

use crate::api::{BearerToken, UserApi};
use crate::error::{Operation, OperationError};
use crate::storage::{Storage, TOKEN_KEY, USER_KEY};

#[derive(Debug, Default)]
struct SessionState {
    token: Option<BearerToken>,
    user: Option<User>,
}

/// Authentication state plus user-management operations.
pub struct SessionStore<A> {
    api: A,
    storage: Box<dyn Storage>,
    state: RwLock<SessionState>,
}

impl<A> std::fmt::Debug for SessionStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl<A: UserApi> SessionStore<A> {
    /// Restore the session persisted in `storage`.
    ///
    /// Never fails. Unreadable storage and a blank token count as "absent".
    /// A malformed user record discards the whole session, and a user record
    /// without a token is ignored.
    pub fn restore(api: A, storage: impl Storage + 'static) -> Self {
        let state = read_persisted(&storage);
        if state.token.is_some() {
            debug!(
                user_id = ?state.user.as_ref().map(|u| u.id),
                "Restored persisted session"
            );
        }
        Self {
            api,
            storage: Box::new(storage),
            state: RwLock::new(state),
        }
    }

    /// The underlying API client.
    pub const fn api(&self) -> &A {
        &self.api
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// The current token, for attaching to other authenticated calls.
    pub async fn token(&self) -> Option<BearerToken> {
        self.state.read().await.token.clone()
    }

    /// The logged-in user record, if known.
    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// True iff a non-empty token is held. Never consults the server.
    pub async fn is_logged_in(&self) -> bool {
        self.state.read().await.token.is_some()
    }

    /// True iff the user record says `is_admin`; false without a user.
    pub async fn is_admin(&self) -> bool {
        self.state
            .read()
            .await
            .user
            .as_ref()
            .is_some_and(|user| user.is_admin)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and persist the new session.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` carrying the server's `error` message, or
    /// "Login failed" when there is none. The previous session is untouched.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<User, OperationError> {
        let credentials = Credentials::new(username, password.expose_secret());
        let grant = self
            .api
            .login(&credentials)
            .await
            .map_err(OperationError::wrap(Operation::Login))?;

        self.persist(&grant.token, &grant.user);

        let mut state = self.state.write().await;
        state.token = Some(grant.token);
        state.user = Some(grant.user.clone());
        drop(state);

        info!(user_id = %grant.user.id, is_admin = grant.user.is_admin, "Session started");
        Ok(grant.user)
    }

    /// Self-service registration. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Registration failed" by default).
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<CreatedUser, OperationError> {
        let credentials = Credentials::new(username, password.expose_secret());
        self.api
            .register(&credentials)
            .await
            .map_err(OperationError::wrap(Operation::Register))
    }

    /// End the session. Never fails.
    ///
    /// The server is notified on a best-effort basis; memory and storage are
    /// cleared regardless of the outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::take(&mut *state)
        };

        if let Some(token) = previous.token.as_ref()
            && let Err(e) = self.api.logout(Some(token)).await
        {
            warn!(error = %e, "Server-side logout failed; clearing local session anyway");
        }

        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "Failed to clear persisted session entry");
            }
        }

        info!("Session cleared");
    }

    /// Refresh the user record from the server and persist it.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to fetch current user" by default).
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, OperationError> {
        let token = self.token().await;
        let user = self
            .api
            .current_user(token.as_ref())
            .await
            .map_err(OperationError::wrap(Operation::CurrentUser))?;

        let mut state = self.state.write().await;
        // A logout that raced this call wins.
        if state.token.is_some() {
            state.user = Some(user.clone());
            drop(state);
            self.persist_user(&user);
        }
        Ok(user)
    }

    /// Change the logged-in user's password. No local state changes.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to update password" by default).
    #[instrument(skip(self, old_password, new_password))]
    pub async fn update_password(
        &self,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), OperationError> {
        let change = PasswordChange {
            old_password: old_password.expose_secret().to_owned(),
            new_password: new_password.expose_secret().to_owned(),
        };
        let token = self.token().await;
        self.api
            .update_password(token.as_ref(), &change)
            .await
            .map_err(OperationError::wrap(Operation::UpdatePassword))?;
        Ok(())
    }

    // =========================================================================
    // User management (admin)
    // =========================================================================

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to fetch users" by default).
    pub async fn fetch_users(&self) -> Result<Vec<User>, OperationError> {
        let token = self.token().await;
        self.api
            .list_users(token.as_ref())
            .await
            .map_err(OperationError::wrap(Operation::FetchUsers))
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to create user" by default).
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<CreatedUser, OperationError> {
        let credentials = Credentials::new(username, password.expose_secret());
        let token = self.token().await;
        self.api
            .create_user(token.as_ref(), &credentials)
            .await
            .map_err(OperationError::wrap(Operation::CreateUser))
    }

    /// Update a user's name or admin flag.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to update user" by default).
    pub async fn update_user(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<ServerMessage, OperationError> {
        let token = self.token().await;
        self.api
            .update_user(token.as_ref(), id, update)
            .await
            .map_err(OperationError::wrap(Operation::UpdateUser))
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to delete user" by default).
    pub async fn delete_user(&self, id: UserId) -> Result<ServerMessage, OperationError> {
        let token = self.token().await;
        self.api
            .delete_user(token.as_ref(), id)
            .await
            .map_err(OperationError::wrap(Operation::DeleteUser))
    }

    /// Reset a user's password; the response carries the temporary password.
    ///
    /// # Errors
    ///
    /// Returns `OperationError` ("Failed to reset password" by default).
    pub async fn reset_user_password(&self, id: UserId) -> Result<PasswordReset, OperationError> {
        let token = self.token().await;
        self.api
            .reset_password(token.as_ref(), id)
            .await
            .map_err(OperationError::wrap(Operation::ResetPassword))
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write token and user to storage. Failures are logged; the in-memory
    /// session stays usable for this process.
    fn persist(&self, token: &BearerToken, user: &User) {
        if let Err(e) = self.storage.set(TOKEN_KEY, token.expose()) {
            warn!(error = %e, "Failed to persist session token");
        }
        self.persist_user(user);
    }

    fn persist_user(&self, user: &User) {
        let result = serde_json::to_string(user)
            .map_err(|e| e.to_string())
            .and_then(|json| self.storage.set(USER_KEY, &json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session user");
        }
    }
}

/// Read the persisted session, treating anything unreadable as absent.
///
/// A user entry that cannot be read or parsed ends the session: the client
/// starts unauthenticated and a malformed entry is cleared from storage.
fn read_persisted(storage: &dyn Storage) -> SessionState {
    let token = match storage.get(TOKEN_KEY) {
        Ok(raw) => raw.and_then(BearerToken::new),
        Err(e) => {
            warn!(error = %e, "Failed to read persisted token");
            None
        }
    };

    if token.is_none() {
        return SessionState::default();
    }

    let user = match storage.get(USER_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<Option<User>>(&raw) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Discarding session with malformed persisted user");
                for key in [TOKEN_KEY, USER_KEY] {
                    if let Err(e) = storage.remove(key) {
                        warn!(error = %e, key, "Failed to clear persisted session entry");
                    }
                }
                return SessionState::default();
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted user; starting logged out");
            return SessionState::default();
        }
    };

    SessionState { token, user }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;

    use super::*;
    use crate::api::LoginGrant;
    use crate::error::ApiError;
    use crate::storage::MemoryStorage;

    /// In-memory `UserApi` that accepts `admin`/`secret` and counts calls.
    #[derive(Default)]
    struct FakeUserApi {
        calls: AtomicUsize,
        fail_logout: bool,
    }

    fn admin_user() -> User {
        User {
            id: UserId::new(1),
            username: "admin".into(),
            is_admin: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn rejected(message: Option<&str>) -> ApiError {
        ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: message.map(String::from),
        }
    }

    impl UserApi for FakeUserApi {
        async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if credentials.username == "admin" && credentials.password == "secret" {
                Ok(LoginGrant {
                    token: BearerToken::new("tok-1").expect("non-empty"),
                    user: admin_user(),
                })
            } else {
                Err(rejected(Some("invalid username or password")))
            }
        }

        async fn register(&self, _: &Credentials) -> Result<CreatedUser, ApiError> {
            Err(rejected(None))
        }

        async fn current_user(&self, token: Option<&BearerToken>) -> Result<User, ApiError> {
            match token {
                Some(_) => Ok(User {
                    username: "renamed".into(),
                    ..admin_user()
                }),
                None => Err(rejected(None)),
            }
        }

        async fn logout(&self, _: Option<&BearerToken>) -> Result<ServerMessage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_logout {
                Err(ApiError::Decode("connection reset".into()))
            } else {
                Ok(ServerMessage::default())
            }
        }

        async fn update_password(
            &self,
            token: Option<&BearerToken>,
            change: &PasswordChange,
        ) -> Result<ServerMessage, ApiError> {
            if token.is_some() && change.old_password == "secret" {
                Ok(ServerMessage::default())
            } else {
                Err(rejected(Some("wrong old password")))
            }
        }

        async fn list_users(&self, token: Option<&BearerToken>) -> Result<Vec<User>, ApiError> {
            token.map(|_| vec![admin_user()]).ok_or_else(|| rejected(None))
        }

        async fn create_user(
            &self,
            _: Option<&BearerToken>,
            _: &Credentials,
        ) -> Result<CreatedUser, ApiError> {
            Err(rejected(Some("username already exists")))
        }

        async fn update_user(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
            _: &UserUpdate,
        ) -> Result<ServerMessage, ApiError> {
            Ok(ServerMessage::default())
        }

        async fn delete_user(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
        ) -> Result<ServerMessage, ApiError> {
            Err(rejected(None))
        }

        async fn reset_password(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
        ) -> Result<PasswordReset, ApiError> {
            Ok(PasswordReset {
                message: None,
                password: Some("123456".into()),
            })
        }
    }

    /// Storage handle shared between the store and the test.
    #[derive(Clone, Default)]
    struct SharedStorage(Arc<MemoryStorage>);

    impl Storage for SharedStorage {
        fn get(&self, key: &str) -> Result<Option<String>, crate::error::StorageError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), crate::error::StorageError> {
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), crate::error::StorageError> {
            self.0.remove(key)
        }
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[tokio::test]
    async fn test_empty_storage_is_logged_out() {
        let store = SessionStore::restore(FakeUserApi::default(), MemoryStorage::new());
        assert!(!store.is_logged_in().await);
        assert!(!store.is_admin().await);
        assert!(store.token().await.is_none());
    }

    #[tokio::test]
    async fn test_restore_malformed_user_starts_logged_out() {
        let storage = SharedStorage::default();
        storage.set(TOKEN_KEY, "tok").expect("write");
        storage.set(USER_KEY, "{not json").expect("write");

        let store = SessionStore::restore(FakeUserApi::default(), storage.clone());

        assert!(!store.is_logged_in().await);
        assert!(!store.is_admin().await);
        assert!(store.user().await.is_none());
        assert_eq!(storage.get(TOKEN_KEY).expect("read"), None);
        assert_eq!(storage.get(USER_KEY).expect("read"), None);
    }

    #[tokio::test]
    async fn test_restore_token_without_user_record() {
        let storage = MemoryStorage::with_entries([(TOKEN_KEY, "tok")]);
        let store = SessionStore::restore(FakeUserApi::default(), storage);
        assert!(store.is_logged_in().await);
        assert!(!store.is_admin().await);
    }

    #[tokio::test]
    async fn test_restore_user_without_admin_flag() {
        let storage = MemoryStorage::with_entries([
            (TOKEN_KEY, "tok"),
            (USER_KEY, r#"{"id": 9, "username": "carol"}"#),
        ]);
        let store = SessionStore::restore(FakeUserApi::default(), storage);
        assert!(store.is_logged_in().await);
        assert!(!store.is_admin().await);
    }

    #[tokio::test]
    async fn test_restore_ignores_user_without_token() {
        let storage = MemoryStorage::with_entries([
            (TOKEN_KEY, ""),
            (USER_KEY, r#"{"id": 1, "username": "admin", "is_admin": true}"#),
        ]);
        let store = SessionStore::restore(FakeUserApi::default(), storage);
        assert!(!store.is_logged_in().await);
        assert!(!store.is_admin().await);
    }

    #[tokio::test]
    async fn test_derived_state_never_calls_server() {
        let store = SessionStore::restore(
            FakeUserApi::default(),
            MemoryStorage::with_entries([(TOKEN_KEY, "tok")]),
        );
        let _ = store.is_logged_in().await;
        let _ = store.is_admin().await;
        assert_eq!(store.api().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let storage = SharedStorage::default();
        let store = SessionStore::restore(FakeUserApi::default(), storage.clone());

        let user = store.login("admin", &secret("secret")).await.expect("login");
        assert_eq!(user.username, "admin");
        assert!(store.is_logged_in().await);
        assert!(store.is_admin().await);

        assert_eq!(storage.get(TOKEN_KEY).expect("read").as_deref(), Some("tok-1"));
        let persisted: User =
            serde_json::from_str(&storage.get(USER_KEY).expect("read").expect("user stored"))
                .expect("valid json");
        assert_eq!(persisted, admin_user());

        // A fresh store over the same storage sees the session.
        let restored = SessionStore::restore(FakeUserApi::default(), storage);
        assert!(restored.is_admin().await);
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_message() {
        let store = SessionStore::restore(FakeUserApi::default(), MemoryStorage::new());
        let err = store
            .login("admin", &secret("wrong"))
            .await
            .expect_err("bad password");
        assert_eq!(err.to_string(), "invalid username or password");
        assert_eq!(err.operation, Operation::Login);
        assert!(!store.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_logout_clears_memory_and_storage() {
        let storage = SharedStorage::default();
        let store = SessionStore::restore(FakeUserApi::default(), storage.clone());
        store.login("admin", &secret("secret")).await.expect("login");

        store.logout().await;

        assert!(!store.is_logged_in().await);
        assert!(!store.is_admin().await);
        assert_eq!(storage.get(TOKEN_KEY).expect("read"), None);
        assert_eq!(storage.get(USER_KEY).expect("read"), None);
    }

    #[tokio::test]
    async fn test_logout_survives_server_failure() {
        let api = FakeUserApi {
            fail_logout: true,
            ..FakeUserApi::default()
        };
        let store = SessionStore::restore(api, MemoryStorage::with_entries([(TOKEN_KEY, "tok")]));
        store.logout().await;
        assert!(!store.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_logout_when_logged_out_skips_server() {
        let store = SessionStore::restore(FakeUserApi::default(), MemoryStorage::new());
        store.logout().await;
        assert_eq!(store.api().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_user_management_error_messages() {
        let store = SessionStore::restore(
            FakeUserApi::default(),
            MemoryStorage::with_entries([(TOKEN_KEY, "tok")]),
        );

        let err = store
            .create_user("bob", &secret("pw"))
            .await
            .expect_err("duplicate");
        assert_eq!(err.to_string(), "username already exists");

        let err = store.delete_user(UserId::new(2)).await.expect_err("rejected");
        assert_eq!(err.to_string(), "Failed to delete user");

        let err = store
            .register("bob", &secret("pw"))
            .await
            .expect_err("rejected");
        assert_eq!(err.to_string(), "Registration failed");

        let err = store
            .update_password(&secret("nope"), &secret("new"))
            .await
            .expect_err("wrong password");
        assert_eq!(err.to_string(), "wrong old password");
    }

    #[tokio::test]
    async fn test_user_management_success_paths() {
        let store = SessionStore::restore(
            FakeUserApi::default(),
            MemoryStorage::with_entries([(TOKEN_KEY, "tok")]),
        );

        assert_eq!(store.fetch_users().await.expect("list").len(), 1);
        store
            .update_password(&secret("secret"), &secret("new"))
            .await
            .expect("password changed");
        store
            .update_user(UserId::new(2), &UserUpdate::default())
            .await
            .expect("updated");
        let reset = store
            .reset_user_password(UserId::new(2))
            .await
            .expect("reset");
        assert_eq!(reset.password.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_fetch_users_without_session_fails() {
        let store = SessionStore::restore(FakeUserApi::default(), MemoryStorage::new());
        let err = store.fetch_users().await.expect_err("no token");
        assert_eq!(err.to_string(), "Failed to fetch users");
    }

    #[tokio::test]
    async fn test_current_user_refreshes_record() {
        let storage = SharedStorage::default();
        let store = SessionStore::restore(FakeUserApi::default(), storage.clone());
        store.login("admin", &secret("secret")).await.expect("login");

        let user = store.current_user().await.expect("refresh");
        assert_eq!(user.username, "renamed");
        assert_eq!(
            store.user().await.map(|u| u.username).as_deref(),
            Some("renamed")
        );
        assert!(
            storage
                .get(USER_KEY)
                .expect("read")
                .is_some_and(|raw| raw.contains("renamed"))
        );
    }
}
