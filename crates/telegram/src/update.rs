//! Inbound update model, reduced to what the pipeline consumes.

use foreman_core::InboundMessage;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Update {
    /// Reduce the update to an [`InboundMessage`]. Edits, media, joins and
    /// every other non-text update yield `None` and are acknowledged without
    /// processing.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text.filter(|text| !text.trim().is_empty())?;
        let from = message.from?;

        Some(InboundMessage {
            source_message_id: message.message_id,
            chat_id: message.chat.id,
            sender_id: from.id,
            username: from.username,
            first_name: from.first_name,
            text,
        })
    }
}
