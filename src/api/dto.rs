use crate::domain::UserId;
use serde::{Deserialize, Serialize};

/// Incoming Telegram webhook update. Only text messages are of interest.
#[derive(Debug, Deserialize, Serialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TelegramChat {
    pub id: UserId,
}

impl TelegramUpdate {
    /// Returns the chat and text of a text message.
    pub fn text_message(&self) -> Option<(UserId, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((message.chat.id, text))
    }
}
