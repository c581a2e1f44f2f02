use serde::{Deserialize, Serialize};

/// Unique identifier for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Unique identifier for a chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Platform-supplied link preview attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub provider_name: Option<String>,
}

impl Embed {
    /// Creates an embed with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author name.
    #[must_use]
    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Inbound chat message as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    channel_id: ChannelId,
    author_id: String,
    author_is_bot: bool,
    content: String,
    embeds: Vec<Embed>,
}

#[allow(missing_docs)]
impl Message {
    #[must_use]
    pub fn new(
        id: impl Into<MessageId>,
        channel_id: impl Into<ChannelId>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            author_is_bot: false,
            content: content.into(),
            embeds: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_embeds(mut self, embeds: Vec<Embed>) -> Self {
        self.embeds = embeds;
        self
    }

    #[must_use]
    pub const fn with_bot_author(mut self, bot: bool) -> Self {
        self.author_is_bot = bot;
        self
    }

    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub const fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    #[must_use]
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    #[must_use]
    pub const fn author_is_bot(&self) -> bool {
        self.author_is_bot
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn embeds(&self) -> &[Embed] {
        &self.embeds
    }

    /// Returns the first embed, which is the one the platform built for the link.
    #[must_use]
    pub fn first_embed(&self) -> Option<&Embed> {
        self.embeds.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = Message::new(1, 2, "42", "hello")
            .with_embeds(vec![Embed::titled("title")])
            .with_bot_author(true);

        assert_eq!(msg.id(), MessageId(1));
        assert_eq!(msg.channel_id(), ChannelId(2));
        assert_eq!(msg.author_id(), "42");
        assert!(msg.author_is_bot());
        assert_eq!(msg.first_embed().and_then(|e| e.title.as_deref()), Some("title"));
    }

    #[test]
    fn test_first_embed_empty() {
        let msg = Message::new(1, 2, "42", "hello");
        assert!(msg.first_embed().is_none());
    }
}
