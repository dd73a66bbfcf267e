//! Back office CLI - session, user and settings management from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in; the session is kept under BACKOFFICE_STATE_DIR
//! bo-cli login -u admin -p secret
//!
//! # Manage users (admin)
//! bo-cli users list
//! bo-cli users create -u alice -p changeme
//! bo-cli users reset-password 7
//!
//! # Read and change system settings
//! bo-cli settings info
//! bo-cli settings set system_name="Acme Admin" allow_registration=false
//!
//! # Ask the navigation guard where a path would lead
//! bo-cli navigate /users
//! ```
//!
//! # Environment Variables
//!
//! - `BACKOFFICE_API_URL` - back end base URL (default `http://127.0.0.1:8080`)
//! - `BACKOFFICE_STATE_DIR` - where the session is persisted (default `.backoffice`)
//! - `BACKOFFICE_HTTP_TIMEOUT_SECS` - request timeout (default 30)
//! - `BACKOFFICE_LOG_JSON` - emit JSON logs when set
//! - `SENTRY_DSN` - enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{App, CliError};

#[derive(Parser)]
#[command(name = "bo-cli")]
#[command(author, version, about = "Back office CLI")]
struct Cli {
    /// Override `BACKOFFICE_API_URL`
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session
    Logout,
    /// Register a new account (when registration is open)
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the logged-in user
    Whoami {
        /// Fetch the record from the server instead of the persisted copy
        #[arg(long)]
        refresh: bool,
    },
    /// Change your password
    Password {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Manage users (admin)
    Users {
        #[command(subcommand)]
        action: commands::users::UsersAction,
    },
    /// Read and change system settings
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Evaluate the navigation guard for a path
    Navigate {
        /// Route path, e.g. `/users`
        path: String,
    },
    /// List known routes and their access rules
    Routes,
}

/// Initialize Sentry when `SENTRY_DSN` is set; the guard must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN")
        .ok()
        .filter(|v| !v.trim().is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "backoffice_client=info,bo_cli=info".into());

    let json = std::env::var_os("BACKOFFICE_LOG_JSON").is_some();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Sentry before tracing so the layer has a client to report to
    let _sentry_guard = init_sentry();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let app = App::from_env(cli.api_url.as_deref())?;

    match cli.command {
        Commands::Login { username, password } => {
            commands::session::login(&app, &username, password).await
        }
        Commands::Logout => {
            commands::session::logout(&app).await;
            Ok(())
        }
        Commands::Register { username, password } => {
            commands::session::register(&app, &username, password).await
        }
        Commands::Whoami { refresh } => commands::session::whoami(&app, refresh).await,
        Commands::Password { old, new } => commands::session::password(&app, old, new).await,
        Commands::Users { action } => commands::users::run(&app, action).await,
        Commands::Settings { action } => commands::settings::run(&app, action).await,
        Commands::Navigate { path } => commands::navigate::navigate(&app, &path).await,
        Commands::Routes => {
            commands::navigate::routes();
            Ok(())
        }
    }
}
