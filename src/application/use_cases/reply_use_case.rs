//! Reply workflow for a message carrying a supported link.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::services::{ChannelActivity, EmbedWait, format_embed};
use crate::application::use_cases::Reuploader;
use crate::domain::entities::Message;
use crate::domain::errors::ChatError;
use crate::domain::ports::{ChatPort, ReplyContent};

/// Runs the reupload alongside the embed wait and posts the merged reply.
#[derive(Clone)]
pub struct ReplyUseCase {
    reuploader: Arc<Reuploader>,
    activity: Arc<ChannelActivity>,
    chat: Arc<dyn ChatPort>,
}

impl ReplyUseCase {
    /// Creates new reply use case.
    #[must_use]
    pub const fn new(
        reuploader: Arc<Reuploader>,
        activity: Arc<ChannelActivity>,
        chat: Arc<dyn ChatPort>,
    ) -> Self {
        Self {
            reuploader,
            activity,
            chat,
        }
    }

    /// Executes the reply for `message`, whose link is `source_url`.
    ///
    /// Reupload failures are logged and produce no reply.
    ///
    /// # Errors
    /// Returns error if the reply could not be posted.
    pub async fn execute(
        &self,
        message: &Message,
        source_url: &str,
        embed_wait: EmbedWait,
    ) -> Result<(), ChatError> {
        let (reupload, embed) = tokio::join!(self.reuploader.reupload(source_url), embed_wait.wait());

        let permalinks = match reupload {
            Ok(permalinks) if !permalinks.is_empty() => permalinks,
            Ok(_) => {
                warn!(url = %source_url, "Reupload produced no files");
                return Ok(());
            }
            Err(e) => {
                error!(url = %source_url, error = %e, "Reupload failed");
                return Ok(());
            }
        };

        let text = embed.as_ref().map(format_embed).unwrap_or_default();
        debug!(message_id = %message.id(), has_embed = embed.is_some(), "Building reply");

        if let Err(e) = self
            .chat
            .hide_embeds(message.channel_id(), message.id())
            .await
        {
            warn!(message_id = %message.id(), error = %e, "Failed to hide original embeds");
        }

        let mut reply = ReplyContent::new(text, permalinks);
        if let Some(reference) = self
            .activity
            .reply_reference(message.channel_id(), message.id())
        {
            reply = reply.with_reply_to(reference);
        }

        self.chat.send_reply(message.channel_id(), reply).await?;
        info!(channel_id = %message.channel_id(), message_id = %message.id(), "Reply sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::EmbedWaiter;
    use crate::application::services::content_sniffer::samples::PNG;
    use crate::domain::entities::{ChannelId, Embed, MessageId};
    use crate::domain::ports::mocks::{MemoryDestination, MockChatPort, MockExtractor, MockFetcher};
    use mockall::Sequence;
    use std::time::Duration;

    const LINK: &str = "https://x.com/someone/status/1";

    fn reuploader(assets: &[&str]) -> Arc<Reuploader> {
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", PNG);
        Arc::new(
            Reuploader::new(
                Arc::new(MemoryDestination::new()),
                Arc::new(fetcher),
                "https://cdn.example.com",
            )
            .with_extractor(Arc::new(MockExtractor::returning("x", "https://x.com/", assets))),
        )
    }

    fn message() -> Message {
        Message::new(100, 7, "42", format!("check {LINK}"))
    }

    #[tokio::test]
    async fn test_reply_hides_embeds_then_sends_media() {
        let mut chat = MockChatPort::new();
        let mut seq = Sequence::new();
        chat.expect_hide_embeds()
            .withf(|channel, message| *channel == ChannelId(7) && *message == MessageId(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        chat.expect_send_reply()
            .withf(|channel, reply| {
                *channel == ChannelId(7)
                    && reply.text == "**A post** hello"
                    && reply.media_urls.len() == 1
                    && reply.media_urls[0].starts_with("https://cdn.example.com/")
                    && reply.reply_to.is_none()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let activity = Arc::new(ChannelActivity::new());
        activity.record(ChannelId(7), MessageId(100));
        let use_case = ReplyUseCase::new(reuploader(&["https://cdn.x/a"]), activity, Arc::new(chat));

        let msg = message().with_embeds(vec![Embed::titled("A post").with_description("hello")]);
        let wait = EmbedWaiter::default().listen(&msg);

        use_case.execute(&msg, LINK, wait).await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_references_message_when_channel_moved_on() {
        let mut chat = MockChatPort::new();
        chat.expect_hide_embeds().returning(|_, _| Ok(()));
        chat.expect_send_reply()
            .withf(|_, reply| reply.reply_to == Some(MessageId(100)) && reply.text.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let activity = Arc::new(ChannelActivity::new());
        activity.record(ChannelId(7), MessageId(100));
        activity.record(ChannelId(7), MessageId(101));
        let use_case = ReplyUseCase::new(reuploader(&["https://cdn.x/a"]), activity, Arc::new(chat));

        let msg = message();
        let wait = EmbedWaiter::new(Duration::from_millis(10)).listen(&msg);

        use_case.execute(&msg, LINK, wait).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_reupload_sends_nothing() {
        let mut chat = MockChatPort::new();
        chat.expect_hide_embeds().times(0);
        chat.expect_send_reply().times(0);

        let use_case = ReplyUseCase::new(
            reuploader(&[]),
            Arc::new(ChannelActivity::new()),
            Arc::new(chat),
        );

        let msg = message();
        let wait = EmbedWaiter::new(Duration::from_millis(10)).listen(&msg);

        use_case.execute(&msg, LINK, wait).await.unwrap();
    }

    #[tokio::test]
    async fn test_hide_failure_still_replies() {
        let mut chat = MockChatPort::new();
        chat.expect_hide_embeds()
            .returning(|_, _| Err(ChatError::rejected(403, "Missing Permissions")));
        chat.expect_send_reply().times(1).returning(|_, _| Ok(()));

        let use_case = ReplyUseCase::new(
            reuploader(&["https://cdn.x/a"]),
            Arc::new(ChannelActivity::new()),
            Arc::new(chat),
        );

        let msg = message();
        let wait = EmbedWaiter::new(Duration::from_millis(10)).listen(&msg);

        use_case.execute(&msg, LINK, wait).await.unwrap();
    }
}
