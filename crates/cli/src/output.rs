//! Terminal output. Results go to stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

use serde::Serialize;

use crate::commands::CliError;

pub fn line(text: impl std::fmt::Display) {
    println!("{text}");
}

/// Print a value as pretty JSON.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print `message` if the server sent one, otherwise `fallback`.
pub fn message(message: Option<&str>, fallback: &str) {
    line(message.filter(|m| !m.trim().is_empty()).unwrap_or(fallback));
}
