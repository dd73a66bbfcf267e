//! Session commands: login, logout, register, whoami, password.

use secrecy::SecretString;

use super::{App, CliError};
use crate::output;

pub async fn login(app: &App, username: &str, password: String) -> Result<(), CliError> {
    let user = app
        .session
        .login(username, &SecretString::from(password))
        .await?;
    let role = if user.is_admin { "admin" } else { "user" };
    output::line(format_args!("Logged in as {} ({role})", user.username));
    Ok(())
}

pub async fn logout(app: &App) {
    app.session.logout().await;
    output::line("Logged out");
}

/// Register a new account. Refused locally when the server says registration
/// is closed, or when that cannot be determined.
pub async fn register(app: &App, username: &str, password: String) -> Result<(), CliError> {
    if !app.settings.info().await.allow_registration {
        return Err(CliError::InvalidArgument(
            "registration is closed on this system".to_owned(),
        ));
    }

    let created = app
        .session
        .register(username, &SecretString::from(password))
        .await?;
    output::message(created.message.as_deref(), "Registered. You can now log in.");
    Ok(())
}

pub async fn whoami(app: &App, refresh: bool) -> Result<(), CliError> {
    app.require_login().await?;

    let user = if refresh {
        Some(app.session.current_user().await?)
    } else {
        app.session.user().await
    };

    match user {
        Some(user) => output::json(&user),
        None => {
            output::line("Logged in, but no user record is stored. Try --refresh.");
            Ok(())
        }
    }
}

pub async fn password(app: &App, old: String, new: String) -> Result<(), CliError> {
    app.require_login().await?;
    app.session
        .update_password(&SecretString::from(old), &SecretString::from(new))
        .await?;
    output::line("Password updated");
    Ok(())
}
