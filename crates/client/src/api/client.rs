//! HTTP implementation of the back office API.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, error, instrument};
use url::Url;

use backoffice_core::{
    CreatedUser, Credentials, OptionEntry, OptionRecord, PasswordChange, PasswordReset,
    ServerMessage, SysInfo, User, UserId, UserUpdate,
};

use super::{BearerToken, LoginGrant, SystemApi, UserApi};
use crate::config::ClientConfig;
use crate::error::ApiError;

/// Back office API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Error body shape used by the back end: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: User,
}

#[derive(Debug, serde::Serialize)]
struct UpdateOptionsBody<'a> {
    options: &'a [OptionEntry],
}

#[derive(Debug, serde::Serialize)]
struct UpdateOptionBody<'a> {
    option_value: &'a str,
}

impl ApiClient {
    /// `api/admin/options/{name}` with the name as one encoded path segment.
    fn option_url(&self, name: &str) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.join("api/admin/options/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Decode("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    /// Create a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Request` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
            }),
        })
    }

    /// Base URL all paths are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Start a request, attaching the bearer token to this request only.
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&BearerToken>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path.trim_start_matches('/'))?;
        let builder = self.inner.client.request(method, url);
        Ok(match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        })
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Send a request whose body may be empty; an empty body decodes as
    /// `T::default()`.
    async fn send_or_default<T: DeserializeOwned + Default>(
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Turn a non-success response into `ApiError::Status`, extracting the
/// body's `error` field when there is one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error);

    error!(status = %status, error = ?message, "Back office API error");

    Err(ApiError::Status { status, message })
}

impl UserApi for ApiClient {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        let builder = self.request(Method::POST, "api/login", None)?.json(credentials);
        let response: LoginResponse = Self::send_json(builder).await?;

        let token = BearerToken::new(response.token)
            .ok_or_else(|| ApiError::Decode("login response carried an empty token".into()))?;

        debug!(user_id = %response.user.id, "Logged in");

        Ok(LoginGrant {
            token,
            user: response.user,
        })
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn register(&self, credentials: &Credentials) -> Result<CreatedUser, ApiError> {
        let builder = self
            .request(Method::POST, "api/register", None)?
            .json(credentials);
        Self::send_or_default(builder).await
    }

    #[instrument(skip(self, token))]
    async fn current_user(&self, token: Option<&BearerToken>) -> Result<User, ApiError> {
        Self::send_json(self.request(Method::GET, "api/user", token)?).await
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: Option<&BearerToken>) -> Result<ServerMessage, ApiError> {
        Self::send_or_default(self.request(Method::POST, "api/logout", token)?).await
    }

    #[instrument(skip(self, token, change))]
    async fn update_password(
        &self,
        token: Option<&BearerToken>,
        change: &PasswordChange,
    ) -> Result<ServerMessage, ApiError> {
        let builder = self
            .request(Method::PUT, "api/user/password", token)?
            .json(change);
        Self::send_or_default(builder).await
    }

    #[instrument(skip(self, token))]
    async fn list_users(&self, token: Option<&BearerToken>) -> Result<Vec<User>, ApiError> {
        // The back end encodes an empty list as `null`.
        let users: Option<Vec<User>> =
            Self::send_json(self.request(Method::GET, "api/admin/users", token)?).await?;
        Ok(users.unwrap_or_default())
    }

    #[instrument(skip(self, token, credentials), fields(username = %credentials.username))]
    async fn create_user(
        &self,
        token: Option<&BearerToken>,
        credentials: &Credentials,
    ) -> Result<CreatedUser, ApiError> {
        let builder = self
            .request(Method::POST, "api/admin/users", token)?
            .json(credentials);
        Self::send_or_default(builder).await
    }

    #[instrument(skip(self, token, update), fields(user_id = %id))]
    async fn update_user(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<ServerMessage, ApiError> {
        let builder = self
            .request(Method::PUT, &format!("api/admin/users/{id}"), token)?
            .json(update);
        Self::send_or_default(builder).await
    }

    #[instrument(skip(self, token), fields(user_id = %id))]
    async fn delete_user(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
    ) -> Result<ServerMessage, ApiError> {
        let builder = self.request(Method::DELETE, &format!("api/admin/users/{id}"), token)?;
        Self::send_or_default(builder).await
    }

    #[instrument(skip(self, token), fields(user_id = %id))]
    async fn reset_password(
        &self,
        token: Option<&BearerToken>,
        id: UserId,
    ) -> Result<PasswordReset, ApiError> {
        let builder = self.request(
            Method::POST,
            &format!("api/admin/users/{id}/reset-password"),
            token,
        )?;
        Self::send_or_default(builder).await
    }
}

impl SystemApi for ApiClient {
    #[instrument(skip(self))]
    async fn sys_info(&self) -> Result<SysInfo, ApiError> {
        Self::send_json(self.request(Method::GET, "api/sysinfo", None)?).await
    }

    #[instrument(skip(self, token))]
    async fn list_options(
        &self,
        token: Option<&BearerToken>,
    ) -> Result<Vec<OptionRecord>, ApiError> {
        let options: Option<Vec<OptionRecord>> =
            Self::send_json(self.request(Method::GET, "api/admin/options", token)?).await?;
        Ok(options.unwrap_or_default())
    }

    #[instrument(skip(self, token), fields(option = %name))]
    async fn get_option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
    ) -> Result<OptionRecord, ApiError> {
        let mut builder = self.inner.client.get(self.option_url(name)?);
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose());
        }
        Self::send_json(builder).await
    }

    #[instrument(skip(self, token, value), fields(option = %name))]
    async fn update_option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        let mut builder = self
            .inner
            .client
            .put(self.option_url(name)?)
            .json(&UpdateOptionBody {
                option_value: value,
            });
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose());
        }
        let _: ServerMessage = Self::send_or_default(builder).await?;
        Ok(())
    }

    #[instrument(skip(self, token, options), fields(count = options.len()))]
    async fn update_options(
        &self,
        token: Option<&BearerToken>,
        options: &[OptionEntry],
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, "api/admin/options", token)?
            .json(&UpdateOptionsBody { options });
        let _: ServerMessage = Self::send_or_default(builder).await?;
        Ok(())
    }
}
