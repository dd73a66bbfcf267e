//! System settings cache.
//!
//! Two ways in:
//! - [`SettingsCache::info`] uses the public `sysinfo` endpoint. It is cheap
//!   and fails soft.
//! - [`SettingsCache::load_all`], [`SettingsCache::update`] and
//!   [`SettingsCache::set_option`] use the admin options endpoints and
//!   propagate every failure.
//!
//! Concurrent first calls to `info` share one request. The in-flight request
//! lives in a single-entry `moka` cache that never stores errors, so a failed
//! fetch is retried by the next caller.
//!
//! Every local write bumps a generation counter. A `sysinfo` response whose
//! request started before the latest write is discarded and fetched again.

use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use backoffice_core::{OptionEntry, OptionRecord, SysInfo, SystemSettings};

use crate::api::{BearerToken, SystemApi};
use crate::error::ApiError;

#[derive(Debug, Default)]
struct CacheState {
    settings: SystemSettings,
    loaded: bool,
    generation: u64,
}

impl CacheState {
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Cached view of the system options.
pub struct SettingsCache<A> {
    api: A,
    state: RwLock<CacheState>,
    in_flight: Cache<(), (u64, SysInfo)>,
}

impl<A> std::fmt::Debug for SettingsCache<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsCache").finish_non_exhaustive()
    }
}

impl<A: SystemApi> SettingsCache<A> {
    /// An empty, not-yet-loaded cache.
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: RwLock::new(CacheState::default()),
            in_flight: Cache::new(1),
        }
    }

    /// The underlying API client.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Snapshot of the cached settings.
    pub async fn settings(&self) -> SystemSettings {
        self.state.read().await.settings.clone()
    }

    /// Whether a fetch has populated the cache.
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    /// System name and registration flag.
    ///
    /// Served from memory once loaded. Otherwise fetched; on failure this
    /// returns [`SysInfo::fail_closed`] and leaves the cache unloaded so the
    /// next call tries again.
    #[instrument(skip(self))]
    pub async fn info(&self) -> SysInfo {
        loop {
            {
                let state = self.state.read().await;
                if state.loaded {
                    return state.settings.info();
                }
            }

            let fetch = async {
                let started = self.state.read().await.generation;
                self.api.sys_info().await.map(|info| (started, info))
            };

            match self.in_flight.try_get_with((), fetch).await {
                Ok((started, info)) => {
                    let mut state = self.state.write().await;
                    if !state.loaded {
                        if state.generation != started {
                            drop(state);
                            self.in_flight.invalidate(&()).await;
                            debug!("Options changed while fetching system info; fetching again");
                            continue;
                        }
                        state.settings.apply_info(&info);
                        state.loaded = true;
                        debug!(system_name = %info.system_name, "System info loaded");
                    }
                    let current = state.settings.info();
                    drop(state);
                    self.in_flight.invalidate(&()).await;
                    return current;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch system info; registration stays closed");
                    return SysInfo::fail_closed();
                }
            }
        }
    }

    /// Fetch every option and fold the recognized ones into the cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the fetch fails; the cache is left as it was.
    #[instrument(skip(self, token))]
    pub async fn load_all(&self, token: Option<&BearerToken>) -> Result<SystemSettings, ApiError> {
        let records = self.api.list_options(token).await?;
        let entries: Vec<OptionEntry> = records.into_iter().map(OptionEntry::from).collect();

        let mut state = self.state.write().await;
        let recognized = state.settings.apply_options(&entries);
        state.loaded = true;
        state.bump();
        debug!(total = entries.len(), recognized, "Loaded system options");
        Ok(state.settings.clone())
    }

    /// Persist options remotely, then apply them locally.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the update; nothing is
    /// applied locally in that case.
    #[instrument(skip(self, token, options), fields(count = options.len()))]
    pub async fn update(
        &self,
        token: Option<&BearerToken>,
        options: &[OptionEntry],
    ) -> Result<(), ApiError> {
        self.api.update_options(token, options).await?;

        let mut state = self.state.write().await;
        let recognized = state.settings.apply_options(options);
        state.bump();
        debug!(recognized, "Applied updated options");
        Ok(())
    }

    /// Persist one option remotely, then apply it locally.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the write (including an
    /// unknown option name); nothing is applied locally in that case.
    #[instrument(skip(self, token, value))]
    pub async fn set_option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        self.api.update_option(token, name, value).await?;

        let mut state = self.state.write().await;
        let recognized = state.settings.apply_option(name, value);
        state.bump();
        debug!(recognized, "Applied updated option");
        Ok(())
    }

    /// Fetch a single option, applying it when its name is recognized.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the fetch fails.
    #[instrument(skip(self, token))]
    pub async fn option(
        &self,
        token: Option<&BearerToken>,
        name: &str,
    ) -> Result<OptionRecord, ApiError> {
        let record = self.api.get_option(token, name).await?;

        let mut state = self.state.write().await;
        state
            .settings
            .apply_option(&record.option_name, &record.option_value);
        state.bump();
        Ok(record)
    }
}
