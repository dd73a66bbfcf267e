//! System-wide display and registration settings.

use serde::{Deserialize, Serialize};

use super::option::{OptionEntry, OptionName};

/// System name shown until the server says otherwise.
pub const DEFAULT_SYSTEM_NAME: &str = "Admin System";

/// Reduced view of the system options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub system_name: String,
    pub system_description: String,
    pub allow_registration: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            system_name: DEFAULT_SYSTEM_NAME.to_owned(),
            system_description: String::new(),
            allow_registration: true,
        }
    }
}

impl SystemSettings {
    /// Apply one option by name.
    ///
    /// Returns `false` (and changes nothing) when the name is not recognized.
    /// `allow_registration` is enabled only by the literal string `"true"`.
    pub fn apply_option(&mut self, name: &str, value: &str) -> bool {
        let Ok(name) = name.parse::<OptionName>() else {
            return false;
        };
        match name {
            OptionName::SystemName => self.system_name = value.to_owned(),
            OptionName::SystemDescription => self.system_description = value.to_owned(),
            OptionName::AllowRegistration => self.allow_registration = value == "true",
        }
        true
    }

    /// Apply a sequence of options in order; later entries win.
    ///
    /// Returns how many entries were recognized.
    pub fn apply_options<'a, I>(&mut self, options: I) -> usize
    where
        I: IntoIterator<Item = &'a OptionEntry>,
    {
        options
            .into_iter()
            .filter(|entry| self.apply_option(&entry.option_name, &entry.option_value))
            .count()
    }

    /// Apply the lightweight system info, replacing all three fields.
    pub fn apply_info(&mut self, info: &SysInfo) {
        self.system_name.clone_from(&info.system_name);
        self.system_description.clone_from(&info.system_description);
        self.allow_registration = info.allow_registration;
    }

    /// Lightweight view of these settings.
    #[must_use]
    pub fn info(&self) -> SysInfo {
        SysInfo {
            system_name: self.system_name.clone(),
            system_description: self.system_description.clone(),
            allow_registration: self.allow_registration,
        }
    }
}

/// Public system info, as served by `GET /api/sysinfo`.
///
/// A missing `allowRegistration` deserializes as `false`: the client never
/// opens registration on an incomplete answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysInfo {
    #[serde(default = "default_system_name")]
    pub system_name: String,
    #[serde(default)]
    pub system_description: String,
    #[serde(default)]
    pub allow_registration: bool,
}

impl SysInfo {
    /// Fail-closed answer used when the info cannot be fetched.
    #[must_use]
    pub fn fail_closed() -> Self {
        Self {
            system_name: DEFAULT_SYSTEM_NAME.to_owned(),
            system_description: String::new(),
            allow_registration: false,
        }
    }
}

fn default_system_name() -> String {
    DEFAULT_SYSTEM_NAME.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SystemSettings::default();
        assert_eq!(settings.system_name, "Admin System");
        assert!(settings.system_description.is_empty());
        assert!(settings.allow_registration);
    }

    #[test]
    fn test_apply_options_ignores_unknown_names() {
        let mut settings = SystemSettings::default();
        let options = [
            OptionEntry::new("system_name", "Acme Admin"),
            OptionEntry::new("theme", "dark"),
            OptionEntry::new("system_description", "Internal tools"),
        ];
        assert_eq!(settings.apply_options(&options), 2);
        assert_eq!(settings.system_name, "Acme Admin");
        assert_eq!(settings.system_description, "Internal tools");
        assert!(settings.allow_registration);
    }

    #[test]
    fn test_allow_registration_requires_literal_true() {
        let mut settings = SystemSettings::default();
        for value in ["TRUE", "1", "yes", ""] {
            settings.apply_option("allow_registration", value);
            assert!(!settings.allow_registration, "{value:?} must not enable");
        }
        settings.apply_option("allow_registration", "true");
        assert!(settings.allow_registration);
    }

    #[test]
    fn test_sys_info_missing_flag_fails_closed() {
        let info: SysInfo =
            serde_json::from_str(r#"{"systemName": "Acme"}"#).expect("valid info");
        assert_eq!(info.system_name, "Acme");
        assert!(!info.allow_registration);
    }

    #[test]
    fn test_apply_info_round_trip() {
        let mut settings = SystemSettings::default();
        let info = SysInfo {
            system_name: "Ops".into(),
            system_description: "desc".into(),
            allow_registration: false,
        };
        settings.apply_info(&info);
        assert_eq!(settings.info(), info);
    }
}
