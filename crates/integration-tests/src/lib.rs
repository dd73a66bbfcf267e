//! Integration tests for the back office client.
//!
//! [`MockBackend`] serves the back office HTTP API from memory on an
//! ephemeral port, so the real `reqwest`-based [`ApiClient`] can be exercised
//! end to end without a database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p backoffice-integration-tests
//! ```
//!
//! # Seed Data
//!
//! - user `admin` / `admin123` (ID 1, admin)
//! - user `viewer` / `viewer123` (ID 2)
//! - options `system_name`, `system_description`, `allow_registration` (`"true"`)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;

use backoffice_client::{ApiClient, ClientConfig};
use backoffice_core::{OptionEntry, User, UserId};

/// Password assigned by the reset-password endpoint.
pub const RESET_PASSWORD: &str = "123456";

/// Seeded admin credentials.
pub const ADMIN: (&str, &str) = ("admin", "admin123");
/// Seeded non-admin credentials.
pub const VIEWER: (&str, &str) = ("viewer", "viewer123");

// =============================================================================
// Mock State
// =============================================================================

struct Account {
    user: User,
    password: String,
}

struct StoredOption {
    id: i64,
    name: String,
    value: String,
}

/// Shared state of the mock back end. Cheap to clone.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    accounts: Mutex<Vec<Account>>,
    options: Mutex<Vec<StoredOption>>,
    tokens: Mutex<HashMap<String, UserId>>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_user_id: AtomicI64,
    next_token: AtomicU64,
    sysinfo_hits: AtomicUsize,
    sysinfo_failing: AtomicBool,
    sysinfo_delay_ms: AtomicU64,
}

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("mock state lock poisoned")
}

impl MockState {
    fn seeded() -> Self {
        let state = Self::default();
        state.insert_account(ADMIN.0, ADMIN.1, true);
        state.insert_account(VIEWER.0, VIEWER.1, false);
        state.set_option("system_name", "Mock Admin");
        state.set_option("system_description", "Integration test instance");
        state.set_option("allow_registration", "true");
        state
    }

    fn insert_account(&self, username: &str, password: &str, is_admin: bool) -> User {
        let id = self.inner.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = chrono::Utc::now();
        let user = User {
            id: UserId::new(id),
            username: username.to_owned(),
            is_admin,
            created_at: Some(now),
            updated_at: Some(now),
        };
        lock(&self.inner.accounts).push(Account {
            user: user.clone(),
            password: password.to_owned(),
        });
        user
    }

    fn issue_token(&self, user_id: UserId) -> String {
        let n = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        let token = format!("mock-{user_id}-{n}-{}", uuid::Uuid::new_v4().simple());
        lock(&self.inner.tokens).insert(token.clone(), user_id);
        token
    }

    /// Number of `GET /api/sysinfo` requests served (including failures).
    #[must_use]
    pub fn sysinfo_hits(&self) -> usize {
        self.inner.sysinfo_hits.load(Ordering::SeqCst)
    }

    /// Make `GET /api/sysinfo` answer 500 until turned off again.
    pub fn set_sysinfo_failing(&self, failing: bool) {
        self.inner.sysinfo_failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every `GET /api/sysinfo` response.
    pub fn set_sysinfo_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.sysinfo_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Current stored value of an option.
    #[must_use]
    pub fn option_value(&self, name: &str) -> Option<String> {
        lock(&self.inner.options)
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.clone())
    }

    /// Set an option directly, bypassing the API.
    pub fn set_option(&self, name: &str, value: &str) {
        upsert_option(&mut lock(&self.inner.options), name, value);
    }

    /// Stored password of a user.
    #[must_use]
    pub fn password_of(&self, username: &str) -> Option<String> {
        lock(&self.inner.accounts)
            .iter()
            .find(|a| a.user.username == username)
            .map(|a| a.password.clone())
    }

    /// Number of tokens the server currently accepts.
    #[must_use]
    pub fn active_tokens(&self) -> usize {
        lock(&self.inner.tokens).len()
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner.requests).clone()
    }

    /// Requests received for a path.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Account, MockError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(MockError(StatusCode::UNAUTHORIZED, "authorization required"))?;

        let user_id = lock(&self.inner.tokens)
            .get(token)
            .copied()
            .ok_or(MockError(StatusCode::UNAUTHORIZED, "invalid or expired token"))?;

        lock(&self.inner.accounts)
            .iter()
            .find(|a| a.user.id == user_id)
            .map(|a| Account {
                user: a.user.clone(),
                password: a.password.clone(),
            })
            .ok_or(MockError(StatusCode::UNAUTHORIZED, "user no longer exists"))
    }

    fn require_admin(&self, headers: &HeaderMap) -> Result<Account, MockError> {
        let account = self.authenticate(headers)?;
        if account.user.is_admin {
            Ok(account)
        } else {
            Err(MockError(StatusCode::FORBIDDEN, "admin access required"))
        }
    }
}

fn upsert_option(options: &mut Vec<StoredOption>, name: &str, value: &str) {
    if let Some(option) = options.iter_mut().find(|o| o.name == name) {
        value.clone_into(&mut option.value);
        return;
    }
    let id = options.iter().map(|o| o.id).max().unwrap_or(0) + 1;
    options.push(StoredOption {
        id,
        name: name.to_owned(),
        value: value.to_owned(),
    });
}

// =============================================================================
// Error Handling
// =============================================================================

/// Error response in the back end's `{"error": "..."}` shape.
#[derive(Debug)]
struct MockError(StatusCode, &'static str);

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

type MockResult<T> = Result<T, MockError>;

// =============================================================================
// Request Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PasswordBody {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct UserUpdateBody {
    username: Option<String>,
    is_admin: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OptionsBody {
    options: Vec<OptionEntry>,
}

#[derive(Debug, Deserialize)]
struct OptionValueBody {
    option_value: String,
}

/// Option row in the back end's exported-field naming.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OptionRow {
    #[serde(rename = "ID")]
    id: i64,
    option_name: String,
    option_value: String,
    auto_load: bool,
}

impl From<&StoredOption> for OptionRow {
    fn from(option: &StoredOption) -> Self {
        Self {
            id: option.id,
            option_name: option.name.clone(),
            option_value: option.value.clone(),
            auto_load: true,
        }
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /api/login
async fn login(
    State(state): State<MockState>,
    Json(body): Json<CredentialsBody>,
) -> MockResult<Json<serde_json::Value>> {
    let user = lock(&state.inner.accounts)
        .iter()
        .find(|a| a.user.username == body.username && a.password == body.password)
        .map(|a| a.user.clone())
        .ok_or(MockError(
            StatusCode::UNAUTHORIZED,
            "invalid username or password",
        ))?;

    let token = state.issue_token(user.id);
    Ok(Json(json!({ "token": token, "user": user })))
}

/// POST /api/register
async fn register(
    State(state): State<MockState>,
    Json(body): Json<CredentialsBody>,
) -> MockResult<(StatusCode, Json<serde_json::Value>)> {
    if state.option_value("allow_registration").as_deref() != Some("true") {
        return Err(MockError(StatusCode::FORBIDDEN, "registration is disabled"));
    }
    create_account(&state, &body, false, "registration successful")
}

fn create_account(
    state: &MockState,
    body: &CredentialsBody,
    is_admin: bool,
    message: &str,
) -> MockResult<(StatusCode, Json<serde_json::Value>)> {
    let taken = lock(&state.inner.accounts)
        .iter()
        .any(|a| a.user.username == body.username);
    if taken {
        return Err(MockError(StatusCode::BAD_REQUEST, "username already exists"));
    }
    let user = state.insert_account(&body.username, &body.password, is_admin);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": message, "user": user })),
    ))
}

/// GET /api/user
async fn current_user(State(state): State<MockState>, headers: HeaderMap) -> MockResult<Json<User>> {
    Ok(Json(state.authenticate(&headers)?.user))
}

/// PUT /api/user/password
async fn update_password(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<PasswordBody>,
) -> MockResult<Json<serde_json::Value>> {
    let account = state.authenticate(&headers)?;
    if account.password != body.old_password {
        return Err(MockError(StatusCode::BAD_REQUEST, "old password is incorrect"));
    }
    if let Some(stored) = lock(&state.inner.accounts)
        .iter_mut()
        .find(|a| a.user.id == account.user.id)
    {
        stored.password = body.new_password;
    }
    Ok(Json(json!({ "message": "password updated" })))
}

/// POST /api/logout
async fn logout(State(state): State<MockState>, headers: HeaderMap) -> MockResult<Json<serde_json::Value>> {
    state.authenticate(&headers)?;
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        lock(&state.inner.tokens).remove(token);
    }
    Ok(Json(json!({ "message": "logged out" })))
}

/// GET /api/sysinfo
async fn sysinfo(State(state): State<MockState>) -> MockResult<Json<serde_json::Value>> {
    state.inner.sysinfo_hits.fetch_add(1, Ordering::SeqCst);

    let delay = state.inner.sysinfo_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.inner.sysinfo_failing.load(Ordering::SeqCst) {
        return Err(MockError(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to load system info",
        ));
    }

    Ok(Json(json!({
        "systemName": state.option_value("system_name").unwrap_or_default(),
        "systemDescription": state.option_value("system_description").unwrap_or_default(),
        "allowRegistration": state.option_value("allow_registration").as_deref() == Some("true"),
    })))
}

/// GET /api/admin/users
async fn list_users(State(state): State<MockState>, headers: HeaderMap) -> MockResult<Json<Vec<User>>> {
    state.require_admin(&headers)?;
    Ok(Json(
        lock(&state.inner.accounts)
            .iter()
            .map(|a| a.user.clone())
            .collect(),
    ))
}

/// POST /api/admin/users
async fn create_user(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<CredentialsBody>,
) -> MockResult<(StatusCode, Json<serde_json::Value>)> {
    state.require_admin(&headers)?;
    create_account(&state, &body, false, "user created")
}

/// PUT /api/admin/users/{id}
async fn update_user(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UserUpdateBody>,
) -> MockResult<Json<serde_json::Value>> {
    state.require_admin(&headers)?;
    let mut accounts = lock(&state.inner.accounts);
    let account = accounts
        .iter_mut()
        .find(|a| a.user.id == UserId::new(id))
        .ok_or(MockError(StatusCode::NOT_FOUND, "user not found"))?;
    if let Some(username) = body.username {
        account.user.username = username;
    }
    if let Some(is_admin) = body.is_admin {
        account.user.is_admin = is_admin;
    }
    account.user.updated_at = Some(chrono::Utc::now());
    drop(accounts);
    Ok(Json(json!({ "message": "user updated" })))
}

/// DELETE /api/admin/users/{id}
async fn delete_user(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> MockResult<Json<serde_json::Value>> {
    state.require_admin(&headers)?;
    let mut accounts = lock(&state.inner.accounts);
    let before = accounts.len();
    accounts.retain(|a| a.user.id != UserId::new(id));
    if accounts.len() == before {
        return Err(MockError(StatusCode::NOT_FOUND, "user not found"));
    }
    drop(accounts);
    Ok(Json(json!({ "message": "user deleted" })))
}

/// POST /api/admin/users/{id}/reset-password
async fn reset_password(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> MockResult<Json<serde_json::Value>> {
    state.require_admin(&headers)?;
    let mut accounts = lock(&state.inner.accounts);
    let account = accounts
        .iter_mut()
        .find(|a| a.user.id == UserId::new(id))
        .ok_or(MockError(StatusCode::NOT_FOUND, "user not found"))?;
    RESET_PASSWORD.clone_into(&mut account.password);
    drop(accounts);
    Ok(Json(
        json!({ "message": "password reset", "password": RESET_PASSWORD }),
    ))
}

/// GET /api/admin/options
async fn list_options(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> MockResult<Json<Vec<OptionRow>>> {
    state.require_admin(&headers)?;
    Ok(Json(
        lock(&state.inner.options).iter().map(OptionRow::from).collect(),
    ))
}

/// GET /api/admin/options/{name}
async fn get_option(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> MockResult<Json<OptionRow>> {
    state.require_admin(&headers)?;
    lock(&state.inner.options)
        .iter()
        .find(|o| o.name == name)
        .map(|o| Json(OptionRow::from(o)))
        .ok_or(MockError(StatusCode::NOT_FOUND, "option not found"))
}

/// PUT /api/admin/options/{name}
///
/// Only existing rows are updated.
async fn update_option(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<OptionValueBody>,
) -> MockResult<Json<serde_json::Value>> {
    state.require_admin(&headers)?;
    let mut options = lock(&state.inner.options);
    let option = options
        .iter_mut()
        .find(|o| o.name == name)
        .ok_or(MockError(StatusCode::NOT_FOUND, "option not found"))?;
    option.value = body.option_value;
    drop(options);
    Ok(Json(json!({ "message": "option updated" })))
}

/// PUT /api/admin/options
async fn update_options(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<OptionsBody>,
) -> MockResult<Json<serde_json::Value>> {
    state.require_admin(&headers)?;
    let mut options = lock(&state.inner.options);
    for entry in &body.options {
        upsert_option(&mut options, &entry.option_name, &entry.option_value);
    }
    drop(options);
    Ok(Json(json!({ "message": "options updated" })))
}

/// Record every request before routing it.
async fn record_request(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_owned(),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };
    lock(&state.inner.requests).push(recorded);
    next.run(request).await
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/sysinfo", get(sysinfo))
        .route("/api/user", get(current_user))
        .route("/api/user/password", put(update_password))
        .route("/api/logout", post(logout))
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/{id}", put(update_user).delete(delete_user))
        .route("/api/admin/users/{id}/reset-password", post(reset_password))
        .route("/api/admin/options", get(list_options).put(update_options))
        .route("/api/admin/options/{name}", get(get_option).put(update_option))
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

// =============================================================================
// Test Server
// =============================================================================

/// A running mock back end. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: MockState,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Start a seeded mock back end on `127.0.0.1` with an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = MockState::seeded();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock back end");
        let addr = listener.local_addr().expect("mock back end address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    #[must_use]
    pub const fn state(&self) -> &MockState {
        &self.state
    }

    /// Client configuration pointing at this back end, with session state
    /// under a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the base URL is rejected.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::with_api_url(&self.base_url()).expect("mock base URL");
        config.state_dir = temp_state_dir();
        config.timeout = Duration::from_secs(5);
        config
    }

    /// A real HTTP client for this back end.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).expect("build API client")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A unique, not-yet-created directory under the system temp dir.
#[must_use]
pub fn temp_state_dir() -> PathBuf {
    std::env::temp_dir().join(format!("backoffice-it-{}", uuid::Uuid::new_v4()))
}
