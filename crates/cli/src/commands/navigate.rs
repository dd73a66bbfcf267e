//! Navigation commands: run the guard, list routes.

use backoffice_core::route::ROUTES;
use backoffice_core::{Navigation, Route, page_title};

use super::{App, CliError};
use crate::output;

/// Print where a navigation to `path` ends up and the page title shown there.
pub async fn navigate(app: &App, path: &str) -> Result<(), CliError> {
    let destination = match app.guard().check_path(path).await {
        Navigation::Proceed => Route::find_by_path(path).ok_or_else(|| {
            CliError::InvalidArgument(format!("unknown path `{path}`"))
        })?,
        Navigation::Redirect(to) => {
            output::line(format_args!("Redirected to {to}"));
            Route::get(to)
        }
    };

    let system_name = app.settings.info().await.system_name;
    output::line(format_args!(
        "{}  {}",
        destination.path,
        page_title(&system_name, Some(destination.title))
    ));
    Ok(())
}

pub fn routes() {
    for route in &ROUTES {
        let access = match (route.meta.requires_auth, route.meta.requires_admin) {
            (_, true) => "admin",
            (true, false) => "login",
            (false, false) => "public",
        };
        output::line(format_args!("{:<10} {:<7} {}", route.path, access, route.title));
    }
}
