//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, warn};

use crate::dialogue::{Personality, TranslationLanguage};

use super::dialogue_manager::{Assistant, Inbound, InboundKind};

const TRANSLATE_PREFIX: &str = "translate_";

/// Inline button actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Callback {
    /// Back to the main menu
    Start,
    Random,
    Talk(Personality),
    Translate(TranslationLanguage),
    /// Pick another target language
    Translator,
    ResumeRestart,
    ResumeCancel,
}

impl Callback {
    pub fn payload(self) -> String {
        match self {
            Callback::Start => "start".to_string(),
            Callback::Random => "random".to_string(),
            Callback::Talk(personality) => personality.id().to_string(),
            Callback::Translate(language) => format!("{TRANSLATE_PREFIX}{}", language.code()),
            Callback::Translator => "translator".to_string(),
            Callback::ResumeRestart => "resume_restart".to_string(),
            Callback::ResumeCancel => "resume_cancel".to_string(),
        }
    }

    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "start" => Some(Callback::Start),
            "random" => Some(Callback::Random),
            "translator" => Some(Callback::Translator),
            "resume_restart" => Some(Callback::ResumeRestart),
            "resume_cancel" => Some(Callback::ResumeCancel),
            _ => {
                if let Some(code) = payload.strip_prefix(TRANSLATE_PREFIX) {
                    TranslationLanguage::from_code(code).map(Callback::Translate)
                } else {
                    Personality::from_id(payload).map(Callback::Talk)
                }
            }
        }
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: teloxide::types::CallbackQuery,
    assistant: Arc<Assistant>,
) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Stop the client's loading indicator whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    let inbound = Inbound {
        chat_id,
        user_id: q.from.id,
        language_code: q.from.language_code.clone(),
        kind: InboundKind::Callback(data),
    };

    if let Err(e) = assistant.handle(inbound).await {
        error!(chat_id = %chat_id, error = ?e, "Failed to handle callback query");
        return Err(e);
    }
    Ok(())
}
