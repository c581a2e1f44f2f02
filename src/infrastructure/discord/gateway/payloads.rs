use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::{
    CLIENT_PROPERTIES_BROWSER, CLIENT_PROPERTIES_DEVICE, CLIENT_PROPERTIES_OS, GatewayOpcode,
};

/// Outbound frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Value,
}

impl GatewayPayload {
    #[must_use]
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: GatewayOpcode::Heartbeat.as_u8(),
            d: sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        }
    }

    #[must_use]
    pub fn identify(token: &str, intents: u32) -> Self {
        let identify = IdentifyData {
            token,
            properties: IdentifyProperties {
                os: CLIENT_PROPERTIES_OS,
                browser: CLIENT_PROPERTIES_BROWSER,
                device: CLIENT_PROPERTIES_DEVICE,
            },
            intents,
        };

        Self {
            op: GatewayOpcode::Identify.as_u8(),
            d: serde_json::to_value(identify).unwrap_or(Value::Null),
        }
    }

    #[must_use]
    pub fn resume(token: &str, session_id: &str, sequence: u64) -> Self {
        let resume = ResumeData {
            token,
            session_id,
            seq: sequence,
        };

        Self {
            op: GatewayOpcode::Resume.as_u8(),
            d: serde_json::to_value(resume).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Serialize)]
struct IdentifyData<'a> {
    token: &'a str,
    properties: IdentifyProperties,
    intents: u32,
}

#[derive(Debug, Serialize)]
struct IdentifyProperties {
    os: &'static str,
    browser: &'static str,
    device: &'static str,
}

#[derive(Debug, Serialize)]
struct ResumeData<'a> {
    token: &'a str,
    session_id: &'a str,
    seq: u64,
}

/// Inbound frame.
#[derive(Debug, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    pub d: Option<Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub resume_gateway_url: Option<String>,
    pub user: UserPayload,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub id: String,
    #[serde(default)]
    pub bot: bool,
}

/// `MESSAGE_CREATE` and `MESSAGE_UPDATE` body. Updates may omit most fields.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub channel_id: String,
    pub author: Option<UserPayload>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<EmbedPayload>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<NamedPayload>,
    pub provider: Option<NamedPayload>,
}

#[derive(Debug, Deserialize)]
pub struct NamedPayload {
    pub name: Option<String>,
}
