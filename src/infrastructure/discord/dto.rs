use serde::{Deserialize, Serialize};

use crate::domain::ports::ReplyContent;

/// `IS_COMPONENTS_V2`: the message body is carried by `components` only.
pub const FLAG_IS_COMPONENTS_V2: u64 = 1 << 15;
/// `SUPPRESS_EMBEDS`.
pub const FLAG_SUPPRESS_EMBEDS: u64 = 1 << 2;

const COMPONENT_TEXT_DISPLAY: u8 = 10;
const COMPONENT_MEDIA_GALLERY: u8 = 12;

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct CreateMessageRequest {
    pub components: Vec<Component>,
    pub flags: u64,
    pub allowed_mentions: AllowedMentions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

impl From<ReplyContent> for CreateMessageRequest {
    fn from(reply: ReplyContent) -> Self {
        let items = reply
            .media_urls
            .into_iter()
            .map(|url| GalleryItem {
                media: UnfurledMedia { url },
            })
            .collect();

        Self {
            components: vec![
                Component::TextDisplay {
                    kind: COMPONENT_TEXT_DISPLAY,
                    content: reply.text,
                },
                Component::MediaGallery {
                    kind: COMPONENT_MEDIA_GALLERY,
                    items,
                },
            ],
            flags: FLAG_IS_COMPONENTS_V2,
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                replied_user: true,
            },
            message_reference: reply.reply_to.map(|id| MessageReference {
                message_id: id.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Component {
    TextDisplay {
        #[serde(rename = "type")]
        kind: u8,
        content: String,
    },
    MediaGallery {
        #[serde(rename = "type")]
        kind: u8,
        items: Vec<GalleryItem>,
    },
}

#[derive(Debug, Serialize)]
pub struct GalleryItem {
    pub media: UnfurledMedia,
}

#[derive(Debug, Serialize)]
pub struct UnfurledMedia {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    pub replied_user: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageReference {
    pub message_id: String,
}

/// Body of `PATCH /channels/{id}/messages/{id}` when only flags change.
#[derive(Debug, Serialize)]
pub struct EditFlagsRequest {
    pub flags: u64,
}

/// Discord API error response structure.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    /// Seconds to wait, present on 429.
    pub retry_after: Option<f64>,
}
