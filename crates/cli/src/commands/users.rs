//! User management commands (admin).

use backoffice_core::{UserId, UserUpdate};
use clap::Subcommand;
use secrecy::SecretString;

use super::{App, CliError};
use crate::output;

#[derive(Subcommand)]
pub enum UsersAction {
    /// List all users
    List,
    /// Create a user
    Create {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "BACKOFFICE_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Rename a user or change the admin flag
    Update {
        id: UserId,
        #[arg(short, long)]
        username: Option<String>,
        /// `true` or `false`
        #[arg(long)]
        admin: Option<bool>,
    },
    /// Delete a user
    Delete { id: UserId },
    /// Reset a user's password and print the temporary one
    ResetPassword { id: UserId },
}

pub async fn run(app: &App, action: UsersAction) -> Result<(), CliError> {
    app.require_login().await?;

    match action {
        UsersAction::List => {
            let users = app.session.fetch_users().await?;
            if users.is_empty() {
                output::line("No users");
            }
            for user in users {
                let admin = if user.is_admin { "  [admin]" } else { "" };
                output::line(format_args!("{:>6}  {}{admin}", user.id.as_i64(), user.username));
            }
        }
        UsersAction::Create { username, password } => {
            let created = app
                .session
                .create_user(&username, &SecretString::from(password))
                .await?;
            output::message(created.message.as_deref(), "User created");
            if let Some(user) = created.user {
                output::line(format_args!("ID: {}", user.id));
            }
        }
        UsersAction::Update {
            id,
            username,
            admin,
        } => {
            let update = UserUpdate {
                username,
                is_admin: admin,
            };
            if update.is_empty() {
                return Err(CliError::InvalidArgument(
                    "nothing to update; pass --username or --admin".to_owned(),
                ));
            }
            let response = app.session.update_user(id, &update).await?;
            output::message(response.message.as_deref(), "User updated");
        }
        UsersAction::Delete { id } => {
            let response = app.session.delete_user(id).await?;
            output::message(response.message.as_deref(), "User deleted");
        }
        UsersAction::ResetPassword { id } => {
            let reset = app.session.reset_user_password(id).await?;
            output::message(reset.message.as_deref(), "Password reset");
            if let Some(password) = reset.password {
                output::line(format_args!("Temporary password: {password}"));
            }
        }
    }
    Ok(())
}
