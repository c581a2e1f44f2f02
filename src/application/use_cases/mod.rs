//! Use case implementations.

mod reply_use_case;
mod reupload_use_case;

pub use reply_use_case::ReplyUseCase;
pub use reupload_use_case::{DEFAULT_MAX_MEDIA_SIZE, Reuploader};
