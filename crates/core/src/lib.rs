//! Back office core - shared types library.
//!
//! This crate provides the types used across the back office components:
//! - `client` - HTTP client, persisted session, settings cache, navigation guard
//! - `cli` - Command-line front end for the back office API
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps the access rules testable in isolation.
//!
//! # Modules
//!
//! - [`types`] - Ids, user records, options, and the system settings reduction
//! - [`route`] - Static route table and the route access decision
//! - [`title`] - Page title formatting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod route;
pub mod title;
pub mod types;

pub use route::{Navigation, Route, RouteMeta, RouteName};
pub use title::page_title;
pub use types::*;
