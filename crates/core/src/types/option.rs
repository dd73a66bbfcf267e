//! System options: named, server-persisted settings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::OptionId;

/// Option names the client understands.
///
/// The server may store more options than these; unrecognized names are
/// carried through as plain strings and ignored by the settings reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    /// Display name of the system.
    SystemName,
    /// Free-form system description.
    SystemDescription,
    /// Whether self-service registration is open (`"true"` / anything else).
    AllowRegistration,
}

impl OptionName {
    /// All recognized option names.
    pub const ALL: [Self; 3] = [
        Self::SystemName,
        Self::SystemDescription,
        Self::AllowRegistration,
    ];

    /// Wire name of the option.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SystemName => "system_name",
            Self::SystemDescription => "system_description",
            Self::AllowRegistration => "allow_registration",
        }
    }
}

impl std::fmt::Display for OptionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an option name the client does not know.
#[derive(Debug, Clone, Error)]
#[error("unknown option name: {0}")]
pub struct UnknownOptionName(pub String);

impl FromStr for OptionName {
    type Err = UnknownOptionName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownOptionName(s.to_owned()))
    }
}

/// A single `{option_name, option_value}` pair, the unit of option writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub option_name: String,
    pub option_value: String,
}

impl OptionEntry {
    /// Build an entry from any name and value.
    #[must_use]
    pub fn new(option_name: impl Into<String>, option_value: impl Into<String>) -> Self {
        Self {
            option_name: option_name.into(),
            option_value: option_value.into(),
        }
    }

    /// The recognized name of this entry, if any.
    #[must_use]
    pub fn recognized_name(&self) -> Option<OptionName> {
        self.option_name.parse().ok()
    }
}

/// Full option row as listed by `GET /api/admin/options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    #[serde(default, alias = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<OptionId>,
    #[serde(alias = "OptionName")]
    pub option_name: String,
    #[serde(alias = "OptionValue")]
    pub option_value: String,
    #[serde(default, alias = "AutoLoad", skip_serializing_if = "Option::is_none")]
    pub auto_load: Option<bool>,
    #[serde(default, alias = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<OptionRecord> for OptionEntry {
    fn from(record: OptionRecord) -> Self {
        Self {
            option_name: record.option_name,
            option_value: record.option_value,
        }
    }
}
