//! Navigation guard over real session and settings stores.

use backoffice_client::{ApiClient, MemoryStorage, NavigationGuard, SessionStore, SettingsCache};
use backoffice_core::{Navigation, Route, RouteName, page_title};
use backoffice_integration_tests::{ADMIN, MockBackend, VIEWER};
use secrecy::SecretString;

const TO_LOGIN: Navigation = Navigation::Redirect(RouteName::Login);
const TO_HOME: Navigation = Navigation::Redirect(RouteName::Home);

struct Stores {
    session: SessionStore<ApiClient>,
    settings: SettingsCache<ApiClient>,
}

impl Stores {
    fn new(backend: &MockBackend) -> Self {
        Self {
            session: SessionStore::restore(backend.client(), MemoryStorage::new()),
            settings: SettingsCache::new(backend.client()),
        }
    }

    async fn logged_in(backend: &MockBackend, (username, password): (&str, &str)) -> Self {
        let stores = Self::new(backend);
        stores
            .session
            .login(username, &SecretString::from(password.to_owned()))
            .await
            .expect("login");
        stores
    }

    const fn guard(&self) -> NavigationGuard<'_, ApiClient, ApiClient> {
        NavigationGuard::new(&self.session, &self.settings)
    }
}

#[tokio::test]
async fn test_anonymous_navigation() {
    let backend = MockBackend::start().await;
    let stores = Stores::new(&backend);
    let guard = stores.guard();

    assert_eq!(guard.check_path("/").await, TO_LOGIN);
    assert_eq!(guard.check_path("/profile").await, TO_LOGIN);
    // Auth is checked before admin.
    assert_eq!(guard.check_path("/users").await, TO_LOGIN);
    assert_eq!(guard.check_path("/settings").await, TO_LOGIN);
    assert_eq!(guard.check_path("/login").await, Navigation::Proceed);
    // None of the above needed system info.
    assert_eq!(backend.state().sysinfo_hits(), 0);

    assert_eq!(guard.check_path("/register").await, Navigation::Proceed);
    assert_eq!(backend.state().sysinfo_hits(), 1);
}

#[tokio::test]
async fn test_registration_closed_redirects_to_login() {
    let backend = MockBackend::start().await;
    backend.state().set_option("allow_registration", "false");
    let stores = Stores::new(&backend);

    assert_eq!(
        stores.guard().check(Route::get(RouteName::Register)).await,
        TO_LOGIN
    );
}

#[tokio::test]
async fn test_registration_blocked_while_sysinfo_fails() {
    let backend = MockBackend::start().await;
    backend.state().set_sysinfo_failing(true);
    let stores = Stores::new(&backend);
    let guard = stores.guard();

    assert_eq!(guard.check_path("/register").await, TO_LOGIN);

    // Recovery is picked up on the next navigation.
    backend.state().set_sysinfo_failing(false);
    assert_eq!(guard.check_path("/register").await, Navigation::Proceed);
    assert_eq!(backend.state().sysinfo_hits(), 2);
}

#[tokio::test]
async fn test_viewer_cannot_reach_admin_pages() {
    let backend = MockBackend::start().await;
    let stores = Stores::logged_in(&backend, VIEWER).await;
    let guard = stores.guard();

    assert_eq!(guard.check_path("/").await, Navigation::Proceed);
    assert_eq!(guard.check_path("/profile").await, Navigation::Proceed);
    assert_eq!(guard.check_path("/users").await, TO_HOME);
    assert_eq!(guard.check_path("/settings").await, TO_HOME);
    assert_eq!(guard.check_path("/missing").await, TO_HOME);
}

#[tokio::test]
async fn test_admin_reaches_everything_until_logout() {
    let backend = MockBackend::start().await;
    let stores = Stores::logged_in(&backend, ADMIN).await;

    for route in [RouteName::Home, RouteName::Profile, RouteName::Users, RouteName::Settings] {
        assert_eq!(
            stores.guard().check(Route::get(route)).await,
            Navigation::Proceed,
            "{route}"
        );
    }

    stores.session.logout().await;
    assert_eq!(stores.guard().check_path("/settings").await, TO_LOGIN);
}

#[tokio::test]
async fn test_page_title_uses_cached_system_name() {
    let backend = MockBackend::start().await;
    let stores = Stores::new(&backend);

    let info = stores.settings.info().await;
    let route = Route::get(RouteName::Settings);

    assert_eq!(
        page_title(&info.system_name, Some(route.title)),
        "System Settings - Mock Admin"
    );
}
