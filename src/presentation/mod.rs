//! Presentation layer: the chat bot and the diagnostic page.

/// Gateway event handling.
pub mod bot;
/// Diagnostic web page.
pub mod diagnostics;

pub use bot::BotHandler;
pub use diagnostics::{DiagnosticsServer, diagnostics_router};
