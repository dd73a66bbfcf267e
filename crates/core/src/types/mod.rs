//! Core types for the back office.
//!
//! Wire-level records shared by the HTTP client and the stores built on it.

pub mod id;
pub mod option;
pub mod settings;
pub mod user;

pub use id::*;
pub use option::{OptionEntry, OptionName, OptionRecord, UnknownOptionName};
pub use settings::{DEFAULT_SYSTEM_NAME, SysInfo, SystemSettings};
pub use user::{
    CreatedUser, Credentials, PasswordChange, PasswordReset, ServerMessage, User, UserUpdate,
};
