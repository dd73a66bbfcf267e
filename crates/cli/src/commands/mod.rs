//! CLI subcommands.

pub mod navigate;
pub mod session;
pub mod settings;
pub mod users;

use backoffice_client::{
    ApiClient, ApiError, ClientConfig, ConfigError, FileStorage, NavigationGuard, OperationError,
    SessionStore, SettingsCache,
};
use thiserror::Error;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Session operation failed; the message is fit for display.
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("Not logged in. Run `bo-cli login` first.")]
    NotLoggedIn,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stores wired to the configured back end.
pub struct App {
    pub session: SessionStore<ApiClient>,
    pub settings: SettingsCache<ApiClient>,
}

impl App {
    /// Build the stores from the environment, restoring any persisted session.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_env(api_url: Option<&str>) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(api_url) = api_url {
            config.api_url = ClientConfig::with_api_url(api_url)?.api_url;
        }

        tracing::debug!(
            api_url = %config.api_url,
            state_dir = %config.state_dir.display(),
            "Loaded configuration"
        );

        let api = ApiClient::new(&config)?;
        let storage = FileStorage::new(&config.state_dir);

        Ok(Self {
            session: SessionStore::restore(api.clone(), storage),
            settings: SettingsCache::new(api),
        })
    }

    pub const fn guard(&self) -> NavigationGuard<'_, ApiClient, ApiClient> {
        NavigationGuard::new(&self.session, &self.settings)
    }

    /// Fail early for commands that need a session.
    pub async fn require_login(&self) -> Result<(), CliError> {
        if self.session.is_logged_in().await {
            Ok(())
        } else {
            Err(CliError::NotLoggedIn)
        }
    }
}
