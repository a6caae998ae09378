//! Mock transport and completion backend for driving the assistant in tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use assistant_bot::bot::dialogue_manager::{Assistant, Inbound, InboundKind};
use assistant_bot::bot::message_handler::Command;
use assistant_bot::bot::transport::ChatTransport;
use assistant_bot::bot::ui_builder::Button;
use assistant_bot::completion::{ChatMessage, CompletionBackend};
use assistant_bot::config::AssistantConfig;
use assistant_bot::errors::CompletionError;
use assistant_bot::localization::LocalizationManager;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::types::{ChatId, MessageId, UserId};

pub const CHAT: ChatId = ChatId(4242);
pub const USER: UserId = UserId(4242);

// ============================================================================
// Mock transport
// ============================================================================

/// Everything the assistant sent, in order
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Text { id: MessageId, text: String },
    Buttons { id: MessageId, text: String, buttons: Vec<Button> },
    Photo { path: PathBuf },
    Document { file_name: String, bytes: Vec<u8> },
    Deleted { id: MessageId },
    Download { file_id: String, destination: PathBuf },
    Commands { commands: Vec<(String, String)> },
}

impl Outbound {
    /// Same event without message ids, for comparing runs
    pub fn describe(&self) -> String {
        match self {
            Outbound::Text { text, .. } => format!("text:{text}"),
            Outbound::Buttons { text, buttons, .. } => {
                let payloads: Vec<_> = buttons.iter().map(|b| b.payload.as_str()).collect();
                format!("buttons:{text}:{}", payloads.join(","))
            }
            Outbound::Photo { path } => format!("photo:{}", path.display()),
            Outbound::Document { file_name, .. } => format!("document:{file_name}"),
            Outbound::Deleted { .. } => "deleted".to_string(),
            Outbound::Download { file_id, .. } => format!("download:{file_id}"),
            Outbound::Commands { commands } => format!("commands:{}", commands.len()),
        }
    }
}

pub struct MockTransport {
    events: Mutex<Vec<Outbound>>,
    next_id: AtomicI32,
    fail_deletes: AtomicBool,
    fail_downloads: AtomicBool,
    failing_text: Mutex<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            fail_deletes: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
            failing_text: Mutex::new(None),
        }
    }

    pub fn events(&self) -> Vec<Outbound> {
        self.events.lock().unwrap().clone()
    }

    /// Return and forget recorded events
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    /// Make `send_text` fail whenever it is asked to send exactly `text`
    pub fn fail_text(&self, text: impl Into<String>) {
        *self.failing_text.lock().unwrap() = Some(text.into());
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Outbound::Text { text, .. } | Outbound::Buttons { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Outbound) {
        self.events.lock().unwrap().push(event);
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(&self, _chat_id: ChatId, text: &str) -> Result<MessageId> {
        if self.failing_text.lock().unwrap().as_deref() == Some(text) {
            return Err(anyhow!("message could not be sent"));
        }
        let id = self.next_message_id();
        self.record(Outbound::Text { id, text: text.to_string() });
        Ok(id)
    }

    async fn send_buttons(&self, _chat_id: ChatId, text: &str, buttons: &[Button]) -> Result<MessageId> {
        let id = self.next_message_id();
        self.record(Outbound::Buttons {
            id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(id)
    }

    async fn send_photo(&self, _chat_id: ChatId, path: &Path) -> Result<()> {
        self.record(Outbound::Photo { path: path.to_path_buf() });
        Ok(())
    }

    async fn send_document(&self, _chat_id: ChatId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.record(Outbound::Document {
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: ChatId, message_id: MessageId) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("message to delete not found"));
        }
        self.record(Outbound::Deleted { id: message_id });
        Ok(())
    }

    /// Writes a small JPEG to `destination`
    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<()> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(anyhow!("download failed"));
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 120, 40])).save(destination)?;
        self.record(Outbound::Download {
            file_id: file_id.to_string(),
            destination: destination.to_path_buf(),
        });
        Ok(())
    }

    async fn set_chat_commands(&self, _chat_id: ChatId, commands: &[(String, String)]) -> Result<()> {
        self.record(Outbound::Commands {
            commands: commands.to_vec(),
        });
        Ok(())
    }
}

// ============================================================================
// Mock completion backend
// ============================================================================

/// Returns queued replies and records every request
pub struct MockCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: CompletionError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("mock reply".to_string()))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn resources_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources")
}

pub fn read_resource(relative: &str) -> String {
    std::fs::read_to_string(resources_dir().join(relative)).unwrap()
}

pub struct Harness {
    pub assistant: Arc<Assistant>,
    pub transport: Arc<MockTransport>,
    pub completion: Arc<MockCompletion>,
    pub localization: LocalizationManager,
    pub tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_resources(resources_dir())
    }

    pub fn with_resources(resources_dir: PathBuf) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = AssistantConfig {
            resources_dir,
            tmp_dir: tmp.path().to_path_buf(),
            resume_font_path: None,
            max_history_messages: 20,
        };
        let transport = Arc::new(MockTransport::new());
        let completion = Arc::new(MockCompletion::new());
        let assistant = Arc::new(
            Assistant::new(
                config,
                Arc::clone(&completion) as Arc<dyn CompletionBackend>,
                Arc::clone(&transport) as Arc<dyn ChatTransport>,
            )
            .unwrap(),
        );

        Self {
            assistant,
            transport,
            completion,
            localization: LocalizationManager::new().unwrap(),
            tmp,
        }
    }

    /// Message in the default (Ukrainian) interface language
    pub fn t(&self, key: &str) -> String {
        self.localization.for_language(None).t(key)
    }

    pub fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.localization.for_language(None).t_args(key, args)
    }

    pub async fn send(&self, kind: InboundKind) {
        self.assistant
            .handle(Inbound {
                chat_id: CHAT,
                user_id: USER,
                language_code: None,
                kind,
            })
            .await
            .unwrap();
    }

    pub async fn command(&self, command: Command) {
        self.send(InboundKind::Command(command)).await;
    }

    pub async fn text(&self, text: &str) {
        self.send(InboundKind::Text(text.to_string())).await;
    }

    pub async fn callback(&self, payload: &str) {
        self.send(InboundKind::Callback(payload.to_string())).await;
    }

    pub async fn photo(&self, file_id: &str) {
        self.send(InboundKind::Photo {
            file_id: file_id.to_string(),
        })
        .await;
    }

    pub async fn state(&self) -> assistant_bot::dialogue::ConversationState {
        self.assistant.sessions().session(CHAT).lock().await.state.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.assistant
            .sessions()
            .session(CHAT)
            .lock()
            .await
            .conversation
            .history()
            .len()
    }
}
