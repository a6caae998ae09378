//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::UserId;
use tracing::{debug, error};

use super::dialogue_manager::{Assistant, Inbound, InboundKind};

/// Commands shown in the chat menu
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Random,
    Gpt,
    Talk,
    Translator,
    Resume,
}

impl Command {
    /// Menu order
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Random,
        Command::Gpt,
        Command::Talk,
        Command::Translator,
        Command::Resume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Random => "random",
            Command::Gpt => "gpt",
            Command::Talk => "talk",
            Command::Translator => "translator",
            Command::Resume => "resume",
        }
    }

    /// Localization key of the menu description
    pub fn menu_key(self) -> &'static str {
        match self {
            Command::Start => "menu-start",
            Command::Random => "menu-random",
            Command::Gpt => "menu-gpt",
            Command::Talk => "menu-talk",
            Command::Translator => "menu-translator",
            Command::Resume => "menu-resume",
        }
    }

    /// Parse `/name`, `/name@bot_username` or `/name args`
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = token.split('@').next().unwrap_or(token);
        Command::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }
}

/// Convert a Telegram message into an engine event
pub fn inbound_from_message(msg: &Message) -> Inbound {
    let user = msg.from.as_ref();
    let kind = if let Some(text) = msg.text() {
        InboundKind::from_text(text)
    } else if let Some(largest_photo) = msg.photo().and_then(|photos| photos.last()) {
        InboundKind::Photo {
            file_id: largest_photo.file.id.0.clone(),
        }
    } else if let Some(doc) = msg.document() {
        debug!(user_id = %msg.chat.id, mime_type = ?doc.mime_type, "Received document from user");
        InboundKind::Document {
            file_id: doc.file.id.0.clone(),
        }
    } else {
        InboundKind::Unsupported
    };

    Inbound {
        chat_id: msg.chat.id,
        // Channel posts have no sender; the chat id stands in for it
        user_id: user
            .map(|u| u.id)
            .unwrap_or(UserId(msg.chat.id.0.unsigned_abs())),
        language_code: user.and_then(|u| u.language_code.clone()),
        kind,
    }
}

pub async fn message_handler(msg: Message, assistant: Arc<Assistant>) -> Result<()> {
    let inbound = inbound_from_message(&msg);
    debug!(user_id = %inbound.user_id, chat_id = %inbound.chat_id, kind = ?inbound.kind, "Received message from user");

    if let Err(e) = assistant.handle(inbound).await {
        error!(chat_id = %msg.chat.id, error = ?e, "Failed to handle message");
        return Err(e);
    }
    Ok(())
}
