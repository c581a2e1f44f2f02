//! preview-relay - A chat bot that keeps social media previews alive.
//!
//! Links posted in chat are resolved to their media, copied into stable
//! storage once per canonical link, and answered with a reply carrying the
//! permanent copies.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing services and use cases.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer containing the bot loop and diagnostic page.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "preview-relay";
