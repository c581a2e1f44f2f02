//! Port for outbound chat operations.

use async_trait::async_trait;

use crate::domain::entities::{ChannelId, MessageId};
use crate::domain::errors::ChatError;

/// Reply assembled from the reuploaded media and the quoted embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyContent {
    /// Text shown above the media, possibly empty.
    pub text: String,
    /// Permalinks to attach as playable media.
    pub media_urls: Vec<String>,
    /// Message to reference when the reply is not adjacent to it.
    pub reply_to: Option<MessageId>,
}

impl ReplyContent {
    /// Creates a reply without a message reference.
    #[must_use]
    pub fn new(text: impl Into<String>, media_urls: Vec<String>) -> Self {
        Self {
            text: text.into(),
            media_urls,
            reply_to: None,
        }
    }

    /// Sets the referenced message.
    #[must_use]
    pub const fn with_reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Outbound side of the chat adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Posts a reply into a channel.
    async fn send_reply(&self, channel_id: ChannelId, reply: ReplyContent) -> Result<(), ChatError>;

    /// Suppresses the platform-generated embeds on a message.
    async fn hide_embeds(&self, channel_id: ChannelId, message_id: MessageId)
    -> Result<(), ChatError>;
}
