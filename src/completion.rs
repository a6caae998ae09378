//! # Completion Module
//!
//! The chat-completion seam. A [`CompletionBackend`] is stateless and shared
//! by every chat; each chat owns a [`Conversation`] with its own system
//! prompt and rolling history.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::CompletionConfig;
use crate::errors::CompletionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A remote model that turns a message list into one reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// System prompt and history of one chat
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: Option<String>,
    history: Vec<ChatMessage>,
    max_history: usize,
}

impl Conversation {
    pub fn new(max_history: usize) -> Self {
        Self {
            system_prompt: None,
            history: Vec::new(),
            max_history,
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Replace the system prompt and forget previous turns
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
        self.history.clear();
    }

    /// Drop prompt and history
    pub fn reset(&mut self) {
        self.system_prompt = None;
        self.history.clear();
    }

    /// One-off question with its own prompt, outside any chat history
    pub async fn send_question(
        backend: &dyn CompletionBackend,
        prompt_text: &str,
        message_text: &str,
    ) -> Result<String, CompletionError> {
        let messages = [ChatMessage::system(prompt_text), ChatMessage::user(message_text)];
        backend.complete(&messages).await
    }

    /// Append a user turn, ask the backend and remember the reply
    ///
    /// On failure the user turn is rolled back so a retry starts clean.
    pub async fn add_message(
        &mut self,
        backend: &dyn CompletionBackend,
        message_text: &str,
    ) -> Result<String, CompletionError> {
        self.history.push(ChatMessage::user(message_text));

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(self.history.iter().cloned());

        match backend.complete(&messages).await {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                self.trim_history();
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    fn trim_history(&mut self) {
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiClient {
    config: CompletionConfig,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl OpenAiClient {
    pub fn new(config: CompletionConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let breaker = CircuitBreaker::new(config.recovery.clone());
        Ok(Self { config, http, breaker })
    }

    async fn request_once(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = ApiRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status: status.as_u16(), body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::Empty)
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.recovery.backoff_delay(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4);
        base + Duration::from_millis(jitter_ms)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        if self.breaker.is_open() {
            warn!("Completion circuit breaker is open, failing fast");
            return Err(CompletionError::CircuitOpen);
        }

        let mut attempt = 0;
        loop {
            match self.request_once(messages).await {
                Ok(reply) => {
                    self.breaker.record_success();
                    debug!(reply_chars = reply.chars().count(), "Completion succeeded");
                    return Ok(reply);
                }
                Err(e) if e.is_transient() && attempt < self.config.recovery.max_retries => {
                    let delay = self.retry_delay(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Completion failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes the last user message and records every request
    struct EchoBackend {
        requests: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    impl EchoBackend {
        fn new(fail: bool) -> Self {
            Self { requests: Mutex::new(Vec::new()), fail }
        }
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(CompletionError::Http("down".into()));
            }
            Ok(format!("echo: {}", messages.last().unwrap().content))
        }
    }

    #[tokio::test]
    async fn test_add_message_keeps_history() {
        let backend = EchoBackend::new(false);
        let mut conversation = Conversation::new(20);
        conversation.set_prompt("be nice");

        conversation.add_message(&backend, "one").await.unwrap();
        let reply = conversation.add_message(&backend, "two").await.unwrap();

        assert_eq!(reply, "echo: two");
        assert_eq!(conversation.history().len(), 4);
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[1][0], ChatMessage::system("be nice"));
        assert_eq!(requests[1].len(), 4);
    }

    #[tokio::test]
    async fn test_set_prompt_clears_history() {
        let backend = EchoBackend::new(false);
        let mut conversation = Conversation::new(20);
        conversation.set_prompt("first");
        conversation.add_message(&backend, "hello").await.unwrap();

        conversation.set_prompt("second");
        assert!(conversation.history().is_empty());
        assert_eq!(conversation.system_prompt(), Some("second"));
    }

    #[tokio::test]
    async fn test_send_question_is_one_off() {
        let backend = EchoBackend::new(false);

        let reply = Conversation::send_question(&backend, "translate", "text")
            .await
            .unwrap();

        assert_eq!(reply, "echo: text");
        let requests = backend.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            [ChatMessage::system("translate"), ChatMessage::user("text")]
        );
    }

    #[tokio::test]
    async fn test_failed_turn_is_rolled_back() {
        let backend = EchoBackend::new(true);
        let mut conversation = Conversation::new(20);
        conversation.set_prompt("chat");

        assert!(conversation.add_message(&backend, "hi").await.is_err());
        assert!(conversation.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let backend = EchoBackend::new(false);
        let mut conversation = Conversation::new(4);
        for i in 0..5 {
            conversation.add_message(&backend, &i.to_string()).await.unwrap();
        }
        assert_eq!(conversation.history().len(), 4);
        assert_eq!(conversation.history()[0], ChatMessage::user("3"));
    }

    #[test]
    fn test_request_serialization() {
        let messages = [ChatMessage::system("p"), ChatMessage::user("q")];
        let request = ApiRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "q");
        assert_eq!(json["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi!"));
    }
}
