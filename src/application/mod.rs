//! Application layer with services and use cases.

/// Shared services.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use services::{ChannelActivity, EmbedWaiter, LinkDetector, UrlCanonicalizer};
pub use use_cases::{ReplyUseCase, Reuploader};
