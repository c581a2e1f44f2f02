//! Discord REST client for the bot's outbound calls.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use tracing::{debug, warn};

use super::dto::{CreateMessageRequest, EditFlagsRequest, ErrorResponse, FLAG_SUPPRESS_EMBEDS};
use crate::domain::entities::{ChannelId, MessageId};
use crate::domain::errors::ChatError;
use crate::domain::ports::{ChatPort, ReplyContent};
use crate::infrastructure::http::{DEFAULT_TIMEOUT, build_client};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_RETRY_AFTER_MS: u64 = 5000;

/// Bot-authenticated Discord REST client.
pub struct DiscordClient {
    client: Client,
    base_url: String,
    authorization: String,
}

impl DiscordClient {
    /// Creates new client with default base URL.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(token: &str) -> Result<Self, ChatError> {
        Self::with_base_url(token, DISCORD_API_BASE)
    }

    /// Creates client with custom base URL.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn with_base_url(token: &str, base_url: impl Into<String>) -> Result<Self, ChatError> {
        let client = build_client(DEFAULT_TIMEOUT)
            .map_err(|e| ChatError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Bot {token}"),
        })
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<(), ChatError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .request(method, &url)
            .header(header::AUTHORIZATION, &self.authorization)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to reach Discord API");
                if e.is_timeout() {
                    ChatError::network("request timed out")
                } else if e.is_connect() {
                    ChatError::network("failed to connect to Discord")
                } else {
                    ChatError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(Self::error_from_response(status, response).await)
    }

    async fn error_from_response(status: StatusCode, response: reqwest::Response) -> ChatError {
        let parsed = response.json::<ErrorResponse>().await.ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let retry_after_ms = parsed
                .and_then(|e| e.retry_after)
                .map_or(DEFAULT_RETRY_AFTER_MS, |secs| (secs * 1000.0).ceil() as u64);
            return ChatError::RateLimited { retry_after_ms };
        }

        let message = parsed.map_or_else(|| format!("HTTP {status}"), |e| e.message);
        ChatError::rejected(status.as_u16(), message)
    }
}

#[async_trait]
impl ChatPort for DiscordClient {
    async fn send_reply(&self, channel_id: ChannelId, reply: ReplyContent) -> Result<(), ChatError> {
        debug!(
            channel_id = %channel_id,
            media = reply.media_urls.len(),
            reply_to = ?reply.reply_to,
            "Sending reply"
        );

        let body = CreateMessageRequest::from(reply);
        self.send_json(
            reqwest::Method::POST,
            &format!("/channels/{channel_id}/messages"),
            &body,
        )
        .await
    }

    async fn hide_embeds(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        debug!(channel_id = %channel_id, message_id = %message_id, "Suppressing embeds");

        self.send_json(
            reqwest::Method::PATCH,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            &EditFlagsRequest {
                flags: FLAG_SUPPRESS_EMBEDS,
            },
        )
        .await
    }
}
