//! Domain error types.

mod chat_error;
mod destination_error;
mod extract_error;
mod fetch_error;
mod reupload_error;

pub use chat_error::ChatError;
pub use destination_error::{DestinationError, validate_object_name};
pub use extract_error::ExtractError;
pub use fetch_error::FetchError;
pub use reupload_error::{RejectReason, ReuploadError};
