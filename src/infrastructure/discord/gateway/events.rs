use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{GatewayError, GatewayResult};
use super::payloads::{
    EmbedPayload, GatewayMessage, HelloPayload, MessagePayload, ReadyPayload,
};
use crate::domain::entities::{Embed, Message};

/// Events surfaced by the gateway task.
#[derive(Debug, Clone)]
pub enum GatewayEventKind {
    Connected {
        session_id: String,
        user_id: String,
    },
    Disconnected {
        reason: String,
        can_resume: bool,
    },
    Reconnecting {
        attempt: u32,
    },
    Resumed,
    Dispatch(DispatchEvent),
    Error {
        message: String,
        recoverable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Ready {
        session_id: String,
        resume_gateway_url: Option<String>,
        user_id: String,
    },
    MessageCreate(Message),
    MessageUpdate(Message),
    Unknown {
        event_type: String,
    },
}

pub struct EventParser;

impl EventParser {
    pub fn parse_message(json: &str) -> GatewayResult<GatewayMessage> {
        serde_json::from_str(json).map_err(|e| GatewayError::serialization(e.to_string()))
    }

    pub fn parse_hello(data: Value) -> GatewayResult<HelloPayload> {
        decode("Hello", data)
    }

    pub fn parse_dispatch(event_type: &str, data: Option<Value>) -> GatewayResult<DispatchEvent> {
        let data = data.ok_or_else(|| GatewayError::protocol("Missing dispatch data"))?;

        match event_type {
            "READY" => {
                let ready: ReadyPayload = decode(event_type, data)?;
                Ok(DispatchEvent::Ready {
                    session_id: ready.session_id,
                    resume_gateway_url: ready.resume_gateway_url,
                    user_id: ready.user.id,
                })
            }
            "MESSAGE_CREATE" => Ok(DispatchEvent::MessageCreate(to_message(decode(
                event_type, data,
            )?)?)),
            "MESSAGE_UPDATE" => Ok(DispatchEvent::MessageUpdate(to_message(decode(
                event_type, data,
            )?)?)),
            _ => Ok(DispatchEvent::Unknown {
                event_type: event_type.to_string(),
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(event_type: &str, data: Value) -> GatewayResult<T> {
    serde_json::from_value(data)
        .map_err(|e| GatewayError::serialization(format!("Failed to parse {event_type}: {e}")))
}

fn parse_snowflake(field: &str, value: &str) -> GatewayResult<u64> {
    value
        .parse()
        .map_err(|_| GatewayError::protocol(format!("invalid {field} snowflake: {value}")))
}

fn to_message(payload: MessagePayload) -> GatewayResult<Message> {
    let id = parse_snowflake("message id", &payload.id)?;
    let channel_id = parse_snowflake("channel id", &payload.channel_id)?;
    let (author_id, author_is_bot) = payload
        .author
        .map_or((String::new(), false), |author| (author.id, author.bot));

    Ok(Message::new(id, channel_id, author_id, payload.content)
        .with_bot_author(author_is_bot)
        .with_embeds(payload.embeds.into_iter().map(to_embed).collect()))
}

fn to_embed(payload: EmbedPayload) -> Embed {
    Embed {
        title: payload.title,
        description: payload.description,
        author_name: payload.author.and_then(|a| a.name),
        provider_name: payload.provider.and_then(|p| p.name),
    }
}
