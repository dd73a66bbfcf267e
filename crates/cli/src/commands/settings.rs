//! System settings commands.

use backoffice_core::OptionEntry;
use clap::Subcommand;

use super::{App, CliError};
use crate::output;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Public system info (no login needed)
    Info,
    /// Load every option and show the resulting settings (admin)
    Show,
    /// Fetch one option by name (admin)
    Get { name: String },
    /// Update options, e.g. `system_name="Acme Admin"` (admin)
    Set {
        #[arg(required = true, value_parser = parse_entry)]
        options: Vec<OptionEntry>,
    },
    /// Overwrite one existing option (admin)
    Put { name: String, value: String },
}

/// Parse `name=value`. The value may be empty.
fn parse_entry(raw: &str) -> Result<OptionEntry, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("option name missing in `{raw}`"));
    }
    Ok(OptionEntry::new(name, value))
}

pub async fn run(app: &App, action: SettingsAction) -> Result<(), CliError> {
    match action {
        SettingsAction::Info => output::json(&app.settings.info().await)?,
        SettingsAction::Show => {
            app.require_login().await?;
            let token = app.session.token().await;
            let settings = app.settings.load_all(token.as_ref()).await?;
            output::json(&settings)?;
        }
        SettingsAction::Get { name } => {
            app.require_login().await?;
            let token = app.session.token().await;
            let record = app.settings.option(token.as_ref(), &name).await?;
            output::json(&record)?;
        }
        SettingsAction::Set { options } => {
            app.require_login().await?;
            for entry in options.iter().filter(|e| e.recognized_name().is_none()) {
                tracing::warn!(option = %entry.option_name, "Option is not used by this client");
            }
            let token = app.session.token().await;
            app.settings.update(token.as_ref(), &options).await?;
            output::line(format_args!("Updated {} option(s)", options.len()));
        }
        SettingsAction::Put { name, value } => {
            app.require_login().await?;
            let token = app.session.token().await;
            app.settings.set_option(token.as_ref(), &name, &value).await?;
            output::line(format_args!("Updated {name}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        let entry = parse_entry("system_name=Acme = Admin").expect("valid");
        assert_eq!(entry, OptionEntry::new("system_name", "Acme = Admin"));

        let entry = parse_entry("system_description=").expect("empty value");
        assert_eq!(entry.option_value, "");

        assert!(parse_entry("allow_registration").is_err());
        assert!(parse_entry("=true").is_err());
    }
}
