//! Navigation guard.
//!
//! Decides, before every route transition, whether to proceed or redirect.
//! This is a convenience for the user, not access control: the back end
//! rejects unauthorized requests regardless of what the guard allowed.

use tracing::debug;

use backoffice_core::{Navigation, Route, RouteName, route::decide};

use crate::api::{SystemApi, UserApi};
use crate::session::SessionStore;
use crate::settings::SettingsCache;

/// Evaluates navigation attempts against the session and settings.
#[derive(Debug)]
pub struct NavigationGuard<'a, U, S> {
    session: &'a SessionStore<U>,
    settings: &'a SettingsCache<S>,
}

impl<'a, U: UserApi, S: SystemApi> NavigationGuard<'a, U, S> {
    #[must_use]
    pub const fn new(session: &'a SessionStore<U>, settings: &'a SettingsCache<S>) -> Self {
        Self { session, settings }
    }

    /// Decide a transition to `route`.
    ///
    /// System info is fetched only when the target is the registration route
    /// and the auth checks passed; a failed fetch keeps registration closed.
    pub async fn check(&self, route: &Route) -> Navigation {
        let is_logged_in = self.session.is_logged_in().await;
        let is_admin = self.session.is_admin().await;

        let needs_settings =
            route.is_registration() && route.meta.access_redirect(is_logged_in, is_admin).is_none();
        let allow_registration = if needs_settings {
            self.settings.info().await.allow_registration
        } else {
            true
        };

        let outcome = decide(route, is_logged_in, is_admin, allow_registration);
        debug!(route = %route.path, ?outcome, "Navigation decided");
        outcome
    }

    /// Decide a transition to `path`. Unknown paths are sent home.
    pub async fn check_path(&self, path: &str) -> Navigation {
        match Route::find_by_path(path) {
            Some(route) => self.check(route).await,
            None => {
                debug!(path, "Unknown path");
                Navigation::Redirect(RouteName::Home)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;

    use backoffice_core::{
        CreatedUser, Credentials, OptionEntry, OptionRecord, PasswordChange, PasswordReset,
        ServerMessage, SysInfo, User, UserId, UserUpdate,
    };

    use super::*;
    use crate::api::{BearerToken, LoginGrant};
    use crate::error::ApiError;
    use crate::storage::{MemoryStorage, TOKEN_KEY, USER_KEY};

    const TO_LOGIN: Navigation = Navigation::Redirect(RouteName::Login);
    const TO_HOME: Navigation = Navigation::Redirect(RouteName::Home);

    fn unreachable_server() -> ApiError {
        ApiError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: None,
        }
    }

    /// The guard only reads session state; every call fails.
    struct OfflineUserApi;

    impl UserApi for OfflineUserApi {
        async fn login(&self, _: &Credentials) -> Result<LoginGrant, ApiError> {
            Err(unreachable_server())
        }
        async fn register(&self, _: &Credentials) -> Result<CreatedUser, ApiError> {
            Err(unreachable_server())
        }
        async fn current_user(&self, _: Option<&BearerToken>) -> Result<User, ApiError> {
            Err(unreachable_server())
        }
        async fn logout(&self, _: Option<&BearerToken>) -> Result<ServerMessage, ApiError> {
            Err(unreachable_server())
        }
        async fn update_password(
            &self,
            _: Option<&BearerToken>,
            _: &PasswordChange,
        ) -> Result<ServerMessage, ApiError> {
            Err(unreachable_server())
        }
        async fn list_users(&self, _: Option<&BearerToken>) -> Result<Vec<User>, ApiError> {
            Err(unreachable_server())
        }
        async fn create_user(
            &self,
            _: Option<&BearerToken>,
            _: &Credentials,
        ) -> Result<CreatedUser, ApiError> {
            Err(unreachable_server())
        }
        async fn update_user(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
            _: &UserUpdate,
        ) -> Result<ServerMessage, ApiError> {
            Err(unreachable_server())
        }
        async fn delete_user(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
        ) -> Result<ServerMessage, ApiError> {
            Err(unreachable_server())
        }
        async fn reset_password(
            &self,
            _: Option<&BearerToken>,
            _: UserId,
        ) -> Result<PasswordReset, ApiError> {
            Err(unreachable_server())
        }
    }

    /// Serves a fixed registration flag, or fails when `None`.
    struct FixedSystemApi {
        allow_registration: Option<bool>,
        calls: AtomicUsize,
    }

    impl FixedSystemApi {
        const fn new(allow_registration: Option<bool>) -> Self {
            Self {
                allow_registration,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SystemApi for FixedSystemApi {
        async fn sys_info(&self) -> Result<SysInfo, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.allow_registration
                .map(|allow_registration| SysInfo {
                    allow_registration,
                    ..SysInfo::fail_closed()
                })
                .ok_or_else(unreachable_server)
        }
        async fn list_options(
            &self,
            _: Option<&BearerToken>,
        ) -> Result<Vec<OptionRecord>, ApiError> {
            Err(unreachable_server())
        }
        async fn get_option(
            &self,
            _: Option<&BearerToken>,
            _: &str,
        ) -> Result<OptionRecord, ApiError> {
            Err(unreachable_server())
        }
        async fn update_options(
            &self,
            _: Option<&BearerToken>,
            _: &[OptionEntry],
        ) -> Result<(), ApiError> {
            Err(unreachable_server())
        }
        async fn update_option(
            &self,
            _: Option<&BearerToken>,
            _: &str,
            _: &str,
        ) -> Result<(), ApiError> {
            Err(unreachable_server())
        }
    }

    fn anonymous() -> SessionStore<OfflineUserApi> {
        SessionStore::restore(OfflineUserApi, MemoryStorage::new())
    }

    fn logged_in(is_admin: bool) -> SessionStore<OfflineUserApi> {
        let user = format!(r#"{{"id": 5, "username": "dana", "is_admin": {is_admin}}}"#);
        SessionStore::restore(
            OfflineUserApi,
            MemoryStorage::with_entries([(TOKEN_KEY, "tok".to_owned()), (USER_KEY, user)]),
        )
    }

    fn settings(allow_registration: Option<bool>) -> SettingsCache<FixedSystemApi> {
        SettingsCache::new(FixedSystemApi::new(allow_registration))
    }

    #[tokio::test]
    async fn test_auth_checked_before_admin() {
        let session = anonymous();
        let settings = settings(Some(true));
        let guard = NavigationGuard::new(&session, &settings);

        assert_eq!(guard.check(Route::get(RouteName::Users)).await, TO_LOGIN);
        assert_eq!(guard.check(Route::get(RouteName::Profile)).await, TO_LOGIN);
        assert_eq!(guard.check(Route::get(RouteName::Login)).await, Navigation::Proceed);
    }

    #[tokio::test]
    async fn test_non_admin_sent_home_from_admin_routes() {
        let session = logged_in(false);
        let settings = settings(Some(true));
        let guard = NavigationGuard::new(&session, &settings);

        assert_eq!(guard.check(Route::get(RouteName::Settings)).await, TO_HOME);
        assert_eq!(guard.check(Route::get(RouteName::Home)).await, Navigation::Proceed);
    }

    #[tokio::test]
    async fn test_admin_reaches_admin_routes() {
        let session = logged_in(true);
        let settings = settings(Some(true));
        let guard = NavigationGuard::new(&session, &settings);

        assert_eq!(guard.check(Route::get(RouteName::Users)).await, Navigation::Proceed);
        assert_eq!(guard.check(Route::get(RouteName::Settings)).await, Navigation::Proceed);
    }

    #[tokio::test]
    async fn test_registration_follows_settings() {
        let session = anonymous();

        let open = settings(Some(true));
        let guard = NavigationGuard::new(&session, &open);
        assert_eq!(guard.check(Route::get(RouteName::Register)).await, Navigation::Proceed);

        let closed = settings(Some(false));
        let guard = NavigationGuard::new(&session, &closed);
        assert_eq!(guard.check(Route::get(RouteName::Register)).await, TO_LOGIN);
    }

    #[tokio::test]
    async fn test_registration_blocked_when_fetch_fails() {
        let session = anonymous();
        let settings = settings(None);
        let guard = NavigationGuard::new(&session, &settings);

        assert_eq!(guard.check(Route::get(RouteName::Register)).await, TO_LOGIN);
        assert!(!settings.is_loaded().await);
    }

    #[tokio::test]
    async fn test_settings_fetched_only_for_registration() {
        let session = logged_in(true);
        let settings = settings(Some(true));
        let guard = NavigationGuard::new(&session, &settings);

        for route in [RouteName::Home, RouteName::Users, RouteName::Login] {
            guard.check(Route::get(route)).await;
        }
        assert_eq!(settings.api().calls.load(Ordering::SeqCst), 0);

        guard.check(Route::get(RouteName::Register)).await;
        guard.check(Route::get(RouteName::Register)).await;
        assert_eq!(settings.api().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_path() {
        let session = logged_in(false);
        let settings = settings(Some(true));
        let guard = NavigationGuard::new(&session, &settings);

        assert_eq!(guard.check_path("/profile/").await, Navigation::Proceed);
        assert_eq!(guard.check_path("/users").await, TO_HOME);
        assert_eq!(guard.check_path("/no-such-page").await, TO_HOME);
    }
}
