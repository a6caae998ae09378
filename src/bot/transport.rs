//! Outbound side of Telegram behind a trait, so flows can run against a
//! recording transport in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, BotCommandScope, FileId, InlineKeyboardMarkup, InputFile, MenuButton, MessageId,
    ParseMode, Recipient,
};
use tracing::{debug, warn};

use super::ui_builder::{Button, create_keyboard};

/// Operations the conversation engine needs from a chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send Markdown text
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId>;

    /// Send plain text with one inline button per row
    async fn send_buttons(&self, chat_id: ChatId, text: &str, buttons: &[Button]) -> Result<MessageId>;

    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<()>;

    async fn send_document(&self, chat_id: ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    /// Download an inbound attachment to `destination`
    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()>;

    /// Replace the chat's command menu with `(command, description)` pairs
    async fn set_chat_commands(&self, chat_id: ChatId, commands: &[(String, String)]) -> Result<()>;
}

/// [`ChatTransport`] backed by the Telegram Bot API
pub struct TelegramTransport {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        #[allow(deprecated)]
        let markdown = ParseMode::Markdown;
        match self
            .bot
            .send_message(chat_id, text)
            .parse_mode(markdown)
            .await
        {
            Ok(msg) => Ok(msg.id),
            Err(e) => {
                // Model output is not always valid Markdown
                warn!(chat_id = %chat_id, error = %e, "Markdown send failed, retrying as plain text");
                let msg = self.bot.send_message(chat_id, text).await?;
                Ok(msg.id)
            }
        }
    }

    async fn send_buttons(&self, chat_id: ChatId, text: &str, buttons: &[Button]) -> Result<MessageId> {
        let keyboard: InlineKeyboardMarkup = create_keyboard(buttons);
        let msg = self
            .bot
            .send_message(chat_id, text)
            .reply_markup(keyboard)
            .await?;
        Ok(msg.id)
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<()> {
        self.bot
            .send_photo(chat_id, InputFile::file(path.to_path_buf()))
            .await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        debug!(chat_id = %chat_id, file_name, size = bytes.len(), "Sending document");
        self.bot
            .send_document(chat_id, InputFile::memory(bytes).file_name(file_name.to_string()))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;

        debug!(destination = %destination.display(), size = bytes.len(), "File downloaded");
        Ok(())
    }

    async fn set_chat_commands(&self, chat_id: ChatId, commands: &[(String, String)]) -> Result<()> {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|(command, description)| BotCommand::new(command.clone(), description.clone()))
            .collect();

        self.bot
            .set_my_commands(commands)
            .scope(BotCommandScope::Chat {
                chat_id: Recipient::Id(chat_id),
            })
            .await?;
        self.bot
            .set_chat_menu_button()
            .chat_id(chat_id)
            .menu_button(MenuButton::Commands)
            .await?;
        Ok(())
    }
}
