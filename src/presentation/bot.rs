//! Gateway event loop that turns link-bearing messages into reply tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::services::{ChannelActivity, EmbedWaiter, LinkDetector};
use crate::application::use_cases::{ReplyUseCase, Reuploader};
use crate::domain::entities::Message;
use crate::domain::ports::ChatPort;
use crate::infrastructure::discord::{DispatchEvent, GatewayEventKind};

/// Routes gateway events to the reply workflow.
pub struct BotHandler {
    reuploader: Arc<Reuploader>,
    embed_waiter: Arc<EmbedWaiter>,
    activity: Arc<ChannelActivity>,
    reply: ReplyUseCase,
    user_id: Option<String>,
}

impl BotHandler {
    /// Creates a handler sharing the given services.
    #[must_use]
    pub fn new(
        reuploader: Arc<Reuploader>,
        embed_waiter: Arc<EmbedWaiter>,
        activity: Arc<ChannelActivity>,
        chat: Arc<dyn ChatPort>,
    ) -> Self {
        let reply = ReplyUseCase::new(Arc::clone(&reuploader), Arc::clone(&activity), chat);
        Self {
            reuploader,
            embed_waiter,
            activity,
            reply,
            user_id: None,
        }
    }

    /// The bot's own user id, once the gateway reported it.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Consumes gateway events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GatewayEventKind>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        info!("Gateway event stream ended");
    }

    /// Handles one event. Returns the reply task if one was spawned.
    pub fn handle_event(&mut self, event: GatewayEventKind) -> Option<JoinHandle<()>> {
        match event {
            GatewayEventKind::Connected {
                session_id,
                user_id,
            } => {
                info!(session_id = %session_id, user_id = %user_id, "Gateway connected");
                self.user_id = Some(user_id);
                None
            }
            GatewayEventKind::Disconnected { reason, can_resume } => {
                warn!(reason = %reason, can_resume = can_resume, "Gateway disconnected");
                None
            }
            GatewayEventKind::Reconnecting { attempt } => {
                info!(attempt = attempt, "Gateway reconnecting");
                None
            }
            GatewayEventKind::Resumed => {
                info!("Gateway session resumed");
                None
            }
            GatewayEventKind::Dispatch(dispatch) => self.handle_dispatch(dispatch),
            GatewayEventKind::Error {
                message,
                recoverable,
            } => {
                if recoverable {
                    warn!(error = %message, "Recoverable gateway error");
                } else {
                    error!(error = %message, "Fatal gateway error");
                }
                None
            }
        }
    }

    fn handle_dispatch(&mut self, event: DispatchEvent) -> Option<JoinHandle<()>> {
        match event {
            DispatchEvent::Ready { user_id, .. } => {
                self.user_id = Some(user_id);
                None
            }
            DispatchEvent::MessageCreate(message) => self.handle_message_create(message),
            DispatchEvent::MessageUpdate(message) => {
                self.embed_waiter.notify_update(&message);
                None
            }
            DispatchEvent::Unknown { event_type } => {
                debug!(event_type = %event_type, "Ignoring dispatch");
                None
            }
        }
    }

    fn handle_message_create(&self, message: Message) -> Option<JoinHandle<()>> {
        self.activity.record(message.channel_id(), message.id());

        if message.author_is_bot() || self.user_id.as_deref() == Some(message.author_id()) {
            return None;
        }

        let url = LinkDetector::first_link(message.content())?.to_string();
        if !self.reuploader.is_supported(&url) {
            debug!(url = %url, "No extractor for link");
            return None;
        }

        let embed_wait = self.embed_waiter.listen(&message);
        let reply = self.reply.clone();
        info!(message_id = %message.id(), url = %url, "Handling link");

        Some(tokio::spawn(async move {
            if let Err(e) = reply.execute(&message, &url, embed_wait).await {
                error!(message_id = %message.id(), error = %e, "Failed to send reply");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::content_sniffer::samples::PNG;
    use crate::domain::entities::{ChannelId, Embed};
    use crate::domain::ports::mocks::{MemoryDestination, MockChatPort, MockExtractor, MockFetcher};
    use std::time::Duration;

    const LINK: &str = "https://x.com/someone/status/1";

    fn handler(chat: MockChatPort) -> (BotHandler, Arc<EmbedWaiter>) {
        let fetcher = MockFetcher::new().with_body("https://cdn.x/a", PNG);
        let reuploader = Reuploader::new(
            Arc::new(MemoryDestination::new()),
            Arc::new(fetcher),
            "https://cdn.example.com",
        )
        .with_extractor(Arc::new(MockExtractor::returning(
            "x",
            "https://x.com/",
            &["https://cdn.x/a"],
        )));
        let waiter = Arc::new(EmbedWaiter::new(Duration::from_millis(50)));
        let handler = BotHandler::new(
            Arc::new(reuploader),
            Arc::clone(&waiter),
            Arc::new(ChannelActivity::new()),
            Arc::new(chat),
        );
        (handler, waiter)
    }

    fn connected(user_id: &str) -> GatewayEventKind {
        GatewayEventKind::Connected {
            session_id: "s".into(),
            user_id: user_id.into(),
        }
    }

    fn create(message: Message) -> GatewayEventKind {
        GatewayEventKind::Dispatch(DispatchEvent::MessageCreate(message))
    }

    #[tokio::test]
    async fn test_supported_link_spawns_reply() {
        let mut chat = MockChatPort::new();
        chat.expect_hide_embeds().times(1).returning(|_, _| Ok(()));
        chat.expect_send_reply()
            .withf(|channel, reply| *channel == ChannelId(7) && reply.text == "**Post**")
            .times(1)
            .returning(|_, _| Ok(()));
        let (mut handler, _) = handler(chat);
        handler.handle_event(connected("1"));

        let message = Message::new(100, 7, "42", format!("look {LINK}"))
            .with_embeds(vec![Embed::titled("Post")]);
        let task = handler.handle_event(create(message)).expect("reply task");

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_own_messages_are_ignored() {
        let (mut handler, _) = handler(MockChatPort::new());
        handler.handle_event(connected("1"));
        assert_eq!(handler.user_id(), Some("1"));

        let message = Message::new(100, 7, "1", format!("look {LINK}"));
        assert!(handler.handle_event(create(message)).is_none());
    }

    #[tokio::test]
    async fn test_other_bots_are_ignored() {
        let (mut handler, waiter) = handler(MockChatPort::new());
        handler.handle_event(connected("1"));

        let message = Message::new(100, 7, "77", format!("look {LINK}")).with_bot_author(true);
        assert!(handler.handle_event(create(message)).is_none());
        assert_eq!(waiter.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_or_missing_link_is_ignored() {
        let (mut handler, waiter) = handler(MockChatPort::new());

        let plain = Message::new(100, 7, "42", "no links here");
        assert!(handler.handle_event(create(plain)).is_none());

        let other = Message::new(101, 7, "42", "https://example.org/page");
        assert!(handler.handle_event(create(other)).is_none());
        assert_eq!(waiter.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_update_resolves_pending_embed() {
        let (mut handler, waiter) = handler(MockChatPort::new());
        let message = Message::new(100, 7, "42", LINK);
        let wait = waiter.listen(&message);

        let update = message.clone().with_embeds(vec![Embed::titled("Late")]);
        let spawned = handler.handle_event(GatewayEventKind::Dispatch(DispatchEvent::MessageUpdate(update)));

        assert!(spawned.is_none());
        assert_eq!(wait.wait().await, Some(Embed::titled("Late")));
    }

    #[tokio::test]
    async fn test_ready_dispatch_sets_user_id() {
        let (mut handler, _) = handler(MockChatPort::new());
        handler.handle_event(GatewayEventKind::Dispatch(DispatchEvent::Ready {
            session_id: "s".into(),
            resume_gateway_url: Some("wss://resume".into()),
            user_id: "55".into(),
        }));

        assert_eq!(handler.user_id(), Some("55"));
    }
}
