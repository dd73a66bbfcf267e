//! Back office client library.
//!
//! Everything the back office front end needs besides rendering:
//! - [`api`] - typed HTTP calls with per-request bearer credentials
//! - [`storage`] - durable key-value storage for the session
//! - [`session`] - the persisted session store (login, logout, user management)
//! - [`settings`] - the system settings cache
//! - [`guard`] - the navigation guard
//!
//! # Security
//!
//! The navigation guard only decides where the client goes next. It is not a
//! security boundary: the back end authorizes every request on its own.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod session;
pub mod settings;
pub mod storage;

pub use api::{ApiClient, BearerToken, LoginGrant, SystemApi, UserApi};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, Operation, OperationError, StorageError};
pub use guard::NavigationGuard;
pub use session::SessionStore;
pub use settings::SettingsCache;
pub use storage::{FileStorage, MemoryStorage, Storage};
