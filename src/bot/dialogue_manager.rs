//! Dialogue Manager module: the conversation engine
//!
//! [`Assistant`] owns the per-chat sessions and runs every flow. It consumes
//! transport-neutral [`Inbound`] events, so the Telegram adapters only have
//! to translate updates and the flows can be driven directly in tests.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{ChatId, MessageId, UserId};
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionBackend, Conversation};
use crate::config::AssistantConfig;
use crate::dialogue::{
    ChatSession, ConversationState, Personality, SessionStore, TranslationLanguage,
};
use crate::intent::{classify, pick_fallback_key, Intent, FALLBACK_HINT_KEY};
use crate::localization::{LocalizationManager, Translator};
use crate::resources::ResourceLoader;
use crate::resume::{render_template, FieldKind, ResumeAnswer, ResumeForm, StepOutcome};
use crate::resume_pdf::{render_resume_pdf, ResumeDocument};

use super::callback_handler::Callback;
use super::message_handler::Command;
use super::transport::ChatTransport;
use super::ui_builder::{
    end_only, language_picker, main_menu_commands, personality_picker, random_fact_buttons,
    resume_controls, translation_reply_buttons,
};

/// File name of the generated resume
pub const RESUME_FILE_NAME: &str = "resume.pdf";

/// One inbound event for a chat
#[derive(Clone, Debug)]
pub struct Inbound {
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// Telegram client language, used for UI strings
    pub language_code: Option<String>,
    pub kind: InboundKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    Command(Command),
    /// A `/command` the bot does not know
    UnknownCommand(String),
    /// Raw callback payload of an inline button
    Callback(String),
    Text(String),
    Photo { file_id: String },
    Document { file_id: String },
    /// Stickers, voice notes and everything else
    Unsupported,
}

impl InboundKind {
    /// Classify message text as a command or free text
    pub fn from_text(text: &str) -> Self {
        if !text.trim_start().starts_with('/') {
            return InboundKind::Text(text.to_string());
        }
        match Command::parse(text) {
            Some(command) => InboundKind::Command(command),
            None => InboundKind::UnknownCommand(text.trim().to_string()),
        }
    }
}

/// Per-event data shared by the flow functions
struct FlowContext<'a> {
    chat_id: ChatId,
    user_id: UserId,
    tr: Translator<'a>,
}

/// Input for the current resume step
enum ResumeInput {
    Text(String),
    Attachment { file_id: String },
    /// Stickers, voice notes and the like
    Other,
}

/// The conversation engine
pub struct Assistant {
    config: AssistantConfig,
    resources: ResourceLoader,
    localization: LocalizationManager,
    sessions: SessionStore,
    completion: Arc<dyn CompletionBackend>,
    transport: Arc<dyn ChatTransport>,
}

impl Assistant {
    pub fn new(
        config: AssistantConfig,
        completion: Arc<dyn CompletionBackend>,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self> {
        Ok(Self {
            resources: ResourceLoader::new(config.resources_dir.clone()),
            localization: LocalizationManager::new()?,
            sessions: SessionStore::new(config.max_history_messages),
            config,
            completion,
            transport,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Drop idle sessions and delete the resume photos they leave behind
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> usize {
        let eviction = self.sessions.evict_idle(max_idle);
        for path in &eviction.temp_files {
            remove_temp_file(path).await;
        }
        eviction.evicted
    }

    /// Handle one inbound event
    ///
    /// Events for the same chat are serialized by the session lock.
    pub async fn handle(&self, inbound: Inbound) -> Result<()> {
        let shared = self.sessions.session(inbound.chat_id);
        let mut session = shared.lock().await;
        session.touch();

        let ctx = FlowContext {
            chat_id: inbound.chat_id,
            user_id: inbound.user_id,
            tr: self.localization.for_language(inbound.language_code.as_deref()),
        };
        debug!(
            chat_id = %ctx.chat_id,
            state = session.state.name(),
            language = ctx.tr.language(),
            "Handling inbound event"
        );

        match inbound.kind {
            InboundKind::Command(command) => self.handle_command(&ctx, &mut session, command).await,
            InboundKind::UnknownCommand(command) => {
                debug!(chat_id = %ctx.chat_id, command = %command, "Ignoring unknown command");
                Ok(())
            }
            InboundKind::Callback(payload) => match Callback::parse(&payload) {
                Some(callback) => self.handle_callback(&ctx, &mut session, callback).await,
                None => {
                    warn!(chat_id = %ctx.chat_id, payload = %payload, "Ignoring unknown callback payload");
                    Ok(())
                }
            },
            InboundKind::Text(text) => self.handle_text(&ctx, &mut session, text).await,
            InboundKind::Photo { file_id } | InboundKind::Document { file_id } => {
                self.handle_attachment(&ctx, &mut session, file_id).await
            }
            InboundKind::Unsupported => {
                if matches!(session.state, ConversationState::Resume(_)) {
                    return self.resume_step(&ctx, &mut session, ResumeInput::Other).await;
                }
                self.handle_unsupported(&ctx, &session).await
            }
        }
    }

    async fn handle_command(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        command: Command,
    ) -> Result<()> {
        info!(chat_id = %ctx.chat_id, command = command.name(), "Command received");
        match command {
            Command::Start => self.main_menu(ctx, session).await,
            Command::Random => self.random_fact(ctx, session).await,
            Command::Gpt => self.enter_gpt(ctx, session).await,
            Command::Talk => self.enter_talk(ctx, session).await,
            Command::Translator => self.enter_translator(ctx, session).await,
            Command::Resume => self.enter_resume(ctx, session).await,
        }
    }

    async fn handle_callback(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        callback: Callback,
    ) -> Result<()> {
        info!(chat_id = %ctx.chat_id, payload = %callback.payload(), "Callback received");
        match callback {
            Callback::Start => self.main_menu(ctx, session).await,
            Callback::Random => self.random_fact(ctx, session).await,
            Callback::Talk(personality) => self.select_personality(ctx, session, personality).await,
            Callback::Translate(language) => self.select_language(ctx, session, language).await,
            Callback::Translator => self.enter_translator(ctx, session).await,
            Callback::ResumeRestart => self.enter_resume(ctx, session).await,
            Callback::ResumeCancel => self.cancel_resume(ctx, session).await,
        }
    }

    async fn handle_text(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        text: String,
    ) -> Result<()> {
        match session.state.clone() {
            ConversationState::None => self.dispatch_intent(ctx, session, &text).await,
            ConversationState::Gpt => self.gpt_message(ctx, session, &text).await,
            ConversationState::Talk { personality } => {
                self.talk_message(ctx, session, personality, &text).await
            }
            ConversationState::Translator { language } => {
                self.translate_message(ctx, language, &text).await
            }
            ConversationState::Resume(_) => {
                self.resume_step(ctx, session, ResumeInput::Text(text)).await
            }
        }
    }

    async fn handle_attachment(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        file_id: String,
    ) -> Result<()> {
        if matches!(session.state, ConversationState::Resume(_)) {
            return self
                .resume_step(ctx, session, ResumeInput::Attachment { file_id })
                .await;
        }
        self.handle_unsupported(ctx, session).await
    }

    async fn handle_unsupported(&self, ctx: &FlowContext<'_>, session: &ChatSession) -> Result<()> {
        debug!(chat_id = %ctx.chat_id, state = session.state.name(), "Unsupported message");
        self.transport
            .send_text(ctx.chat_id, &ctx.tr.t("unsupported-message"))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Clear the session, removing a downloaded resume photo if there is one
    async fn reset_session(&self, session: &mut ChatSession) {
        if let ConversationState::Resume(form) = &session.state {
            if let Some(path) = form.photo_path() {
                remove_temp_file(Path::new(path)).await;
            }
        }
        session.clear();
    }

    /// Send the flow picture, or a notice when it is missing
    async fn send_image(&self, ctx: &FlowContext<'_>, name: &str) -> Result<()> {
        match self.resources.find_image(name) {
            Some(path) => self.transport.send_photo(ctx.chat_id, &path).await,
            None => {
                self.transport
                    .send_text(ctx.chat_id, &ctx.tr.t("image-unavailable"))
                    .await?;
                Ok(())
            }
        }
    }

    /// Run `work` while a transient waiting message is shown
    ///
    /// The waiting message is deleted whether `work` succeeds or not.
    async fn while_waiting<T>(
        &self,
        chat_id: ChatId,
        waiting_text: &str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let waiting = self.transport.send_text(chat_id, waiting_text).await?;
        let result = work.await;
        self.delete_transient(chat_id, waiting).await;
        result
    }

    async fn delete_transient(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.transport.delete_message(chat_id, message_id).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to delete waiting message");
        }
    }

    // ------------------------------------------------------------------
    // Main menu and intent dispatch
    // ------------------------------------------------------------------

    async fn main_menu(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;

        self.send_image(ctx, "start").await?;
        let welcome = self.resources.load_message("start")?;
        self.transport.send_text(ctx.chat_id, &welcome).await?;

        if let Err(e) = self
            .transport
            .set_chat_commands(ctx.chat_id, &main_menu_commands(&ctx.tr))
            .await
        {
            warn!(chat_id = %ctx.chat_id, error = %e, "Failed to set chat commands");
        }
        Ok(())
    }

    async fn dispatch_intent(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<()> {
        let Some(intent) = classify(text) else {
            let reply_key = pick_fallback_key(&mut rand::thread_rng());
            let reply = format!("{}\n{}", ctx.tr.t(reply_key), ctx.tr.t(FALLBACK_HINT_KEY));
            self.transport.send_text(ctx.chat_id, &reply).await?;
            return Ok(());
        };

        info!(chat_id = %ctx.chat_id, intent = ?intent, "Intent recognized");
        self.transport
            .send_text(ctx.chat_id, &ctx.tr.t(intent.notice_key()))
            .await?;

        match intent {
            Intent::RandomFact => self.random_fact(ctx, session).await,
            Intent::Gpt => self.enter_gpt(ctx, session).await,
            Intent::Talk => self.enter_talk(ctx, session).await,
            Intent::Translator => self.enter_translator(ctx, session).await,
        }
    }

    // ------------------------------------------------------------------
    // Random fact
    // ------------------------------------------------------------------

    async fn random_fact(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        self.send_image(ctx, "random").await?;
        let prompt = self.resources.load_prompt("random")?;

        self.while_waiting(ctx.chat_id, &ctx.tr.t("random-searching"), async {
            match Conversation::send_question(
                self.completion.as_ref(),
                &prompt,
                &ctx.tr.t("random-question"),
            )
            .await
            {
                Ok(fact) => {
                    self.transport
                        .send_buttons(ctx.chat_id, &fact, &random_fact_buttons(&ctx.tr))
                        .await?;
                }
                Err(e) => {
                    error!(chat_id = %ctx.chat_id, error = %e, "Failed to get random fact");
                    self.transport
                        .send_text(ctx.chat_id, &ctx.tr.t("random-error"))
                        .await?;
                }
            }
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // ChatGPT
    // ------------------------------------------------------------------

    async fn enter_gpt(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        self.send_image(ctx, "gpt").await?;

        let prompt = self.resources.load_prompt("gpt")?;
        session.conversation.set_prompt(prompt);
        self.transport.send_text(ctx.chat_id, &ctx.tr.t("gpt-ask")).await?;
        session.state = ConversationState::Gpt;
        Ok(())
    }

    async fn gpt_message(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<()> {
        let conversation = &mut session.conversation;
        self.while_waiting(ctx.chat_id, &ctx.tr.t("waiting"), async {
            match conversation.add_message(self.completion.as_ref(), text).await {
                Ok(reply) => {
                    self.transport.send_text(ctx.chat_id, &reply).await?;
                }
                Err(e) => {
                    error!(chat_id = %ctx.chat_id, error = %e, "Failed to get ChatGPT reply");
                    self.transport
                        .send_text(ctx.chat_id, &ctx.tr.t("gpt-error"))
                        .await?;
                }
            }
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Talk with a personality
    // ------------------------------------------------------------------

    async fn enter_talk(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        session.state = ConversationState::Talk { personality: None };

        self.send_image(ctx, "talk").await?;
        self.transport
            .send_buttons(ctx.chat_id, &ctx.tr.t("talk-choose"), &personality_picker(&ctx.tr))
            .await?;
        Ok(())
    }

    async fn select_personality(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        personality: Personality,
    ) -> Result<()> {
        self.reset_session(session).await;

        let prompt = self.resources.load_prompt(personality.id())?;
        session.conversation.set_prompt(prompt);
        session.state = ConversationState::Talk {
            personality: Some(personality),
        };

        self.send_image(ctx, personality.id()).await?;
        let name = personality.display_name();
        let greeting = ctx.tr.t_args("talk-greeting", &[("name", name.as_str())]);
        self.transport
            .send_buttons(ctx.chat_id, &greeting, &end_only(&ctx.tr))
            .await?;
        Ok(())
    }

    async fn talk_message(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        personality: Option<Personality>,
        text: &str,
    ) -> Result<()> {
        let Some(personality) = personality else {
            self.transport
                .send_text(ctx.chat_id, &ctx.tr.t("talk-choose-first"))
                .await?;
            return Ok(());
        };

        let conversation = &mut session.conversation;
        self.while_waiting(ctx.chat_id, &ctx.tr.t("waiting"), async {
            match conversation.add_message(self.completion.as_ref(), text).await {
                Ok(reply) => {
                    let answer = format!("{}: {}", personality.display_name(), reply);
                    self.transport
                        .send_buttons(ctx.chat_id, &answer, &end_only(&ctx.tr))
                        .await?;
                }
                Err(e) => {
                    error!(chat_id = %ctx.chat_id, personality = personality.id(), error = %e, "Failed to get personality reply");
                    self.transport
                        .send_text(ctx.chat_id, &ctx.tr.t("talk-error"))
                        .await?;
                }
            }
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Translator
    // ------------------------------------------------------------------

    async fn enter_translator(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        session.state = ConversationState::Translator { language: None };

        self.send_image(ctx, "translator").await?;
        self.transport
            .send_buttons(ctx.chat_id, &ctx.tr.t("translator-choose"), &language_picker(&ctx.tr))
            .await?;
        Ok(())
    }

    async fn select_language(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        language: TranslationLanguage,
    ) -> Result<()> {
        session.state = ConversationState::Translator {
            language: Some(language),
        };
        let message = ctx
            .tr
            .t_args("translator-send-text", &[("language", language.name())]);
        self.transport.send_text(ctx.chat_id, &message).await?;
        Ok(())
    }

    async fn translate_message(
        &self,
        ctx: &FlowContext<'_>,
        language: Option<TranslationLanguage>,
        text: &str,
    ) -> Result<()> {
        let Some(language) = language else {
            self.transport
                .send_text(ctx.chat_id, &ctx.tr.t("translator-choose-first"))
                .await?;
            return Ok(());
        };

        let prompt = self.resources.load_translator_prompt(language.code())?;

        // Each message is translated on its own, without chat history
        self.while_waiting(ctx.chat_id, &ctx.tr.t("translator-waiting"), async {
            match Conversation::send_question(self.completion.as_ref(), &prompt, text).await {
                Ok(translated) => {
                    let title = ctx
                        .tr
                        .t_args("translator-result", &[("language", language.name())]);
                    self.transport
                        .send_buttons(
                            ctx.chat_id,
                            &format!("{title}\n\n{translated}"),
                            &translation_reply_buttons(&ctx.tr),
                        )
                        .await?;
                }
                Err(e) => {
                    error!(chat_id = %ctx.chat_id, language = language.code(), error = %e, "Translation failed");
                    self.transport
                        .send_text(ctx.chat_id, &ctx.tr.t("translator-error"))
                        .await?;
                }
            }
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Resume
    // ------------------------------------------------------------------

    async fn enter_resume(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        let form = ResumeForm::new();
        let first_prompt = form
            .current_field()
            .map(|field| ctx.tr.t(&field.prompt_key()))
            .unwrap_or_default();
        session.state = ConversationState::Resume(form);

        self.send_image(ctx, "resume").await?;
        self.transport
            .send_buttons(ctx.chat_id, &first_prompt, &resume_controls(&ctx.tr))
            .await?;
        Ok(())
    }

    async fn cancel_resume(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        self.reset_session(session).await;
        self.transport
            .send_text(ctx.chat_id, &ctx.tr.t("resume-cancelled"))
            .await?;
        Ok(())
    }

    fn photo_path(&self, user_id: UserId) -> PathBuf {
        self.config.tmp_dir.join(format!("{}_photo.jpg", user_id.0))
    }

    async fn resume_step(
        &self,
        ctx: &FlowContext<'_>,
        session: &mut ChatSession,
        input: ResumeInput,
    ) -> Result<()> {
        let field = match &session.state {
            ConversationState::Resume(form) => form.current_field(),
            _ => return Ok(()),
        };
        let Some(field) = field else {
            warn!(chat_id = %ctx.chat_id, "Resume form already complete, resetting session");
            self.reset_session(session).await;
            return match input {
                ResumeInput::Text(text) => self.dispatch_intent(ctx, session, &text).await,
                _ => self.handle_unsupported(ctx, session).await,
            };
        };

        let answer = match (field.kind, input) {
            (FieldKind::Text, ResumeInput::Text(text)) => ResumeAnswer::Text(text),
            (FieldKind::Photo, ResumeInput::Attachment { file_id }) => {
                let destination = self.photo_path(ctx.user_id);
                match self.transport.download_file(&file_id, &destination).await {
                    Ok(()) => ResumeAnswer::Photo(destination.to_string_lossy().into_owned()),
                    Err(e) => {
                        error!(chat_id = %ctx.chat_id, error = %e, "Failed to download resume photo");
                        ResumeAnswer::Other
                    }
                }
            }
            _ => ResumeAnswer::Other,
        };

        let ConversationState::Resume(form) = &mut session.state else {
            return Ok(());
        };
        let outcome = form.accept(answer);
        debug!(chat_id = %ctx.chat_id, step = form.step_index(), outcome = ?outcome, "Resume step");

        match outcome {
            StepOutcome::Rejected(field) => {
                let retry_key = match field.kind {
                    FieldKind::Photo => "resume-photo-retry",
                    FieldKind::Text => "resume-text-retry",
                };
                self.transport
                    .send_buttons(ctx.chat_id, &ctx.tr.t(retry_key), &resume_controls(&ctx.tr))
                    .await?;
                Ok(())
            }
            StepOutcome::Next(field) => {
                self.transport
                    .send_buttons(
                        ctx.chat_id,
                        &ctx.tr.t(&field.prompt_key()),
                        &resume_controls(&ctx.tr),
                    )
                    .await?;
                Ok(())
            }
            StepOutcome::Complete => self.finish_resume(ctx, session).await,
        }
    }

    /// Generate, render and send the resume
    ///
    /// The session is cleared before anything is sent, and the photo is
    /// removed whatever the outcome.
    async fn finish_resume(&self, ctx: &FlowContext<'_>, session: &mut ChatSession) -> Result<()> {
        let ConversationState::Resume(form) = std::mem::take(&mut session.state) else {
            return Ok(());
        };
        session.clear();

        let result = async {
            self.transport
                .send_text(ctx.chat_id, &ctx.tr.t("resume-wait"))
                .await?;
            self.build_and_send_resume(ctx, &form).await
        }
        .await;

        if let Some(path) = form.photo_path() {
            remove_temp_file(Path::new(path)).await;
        }

        match result {
            Ok(()) => info!(chat_id = %ctx.chat_id, "Resume sent"),
            Err(e) => {
                error!(chat_id = %ctx.chat_id, error = ?e, "Failed to create resume");
                self.transport
                    .send_text(ctx.chat_id, &ctx.tr.t("resume-error"))
                    .await?;
            }
        }
        Ok(())
    }

    async fn build_and_send_resume(&self, ctx: &FlowContext<'_>, form: &ResumeForm) -> Result<()> {
        let template = self.resources.load_prompt("resume")?;
        let prompt = render_template(&template, form.data());
        let prose = Conversation::send_question(
            self.completion.as_ref(),
            &prompt,
            &ctx.tr.t("resume-instruction"),
        )
        .await?;

        let name = form.get("name").to_string();
        let specialty = form.get("specialty").to_string();
        let photo = form.photo_path().map(PathBuf::from);
        let font = self.config.resume_font_path.clone();

        let pdf = tokio::task::spawn_blocking(move || {
            let document = ResumeDocument {
                name: &name,
                specialty: &specialty,
                photo_path: photo.as_deref(),
                body: &prose,
            };
            render_resume_pdf(&document, font.as_deref())
        })
        .await
        .context("resume rendering task panicked")??;

        self.transport
            .send_document(ctx.chat_id, RESUME_FILE_NAME, pdf)
            .await
    }
}

async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Temporary file cleaned up"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(path = %path.display(), error = %e, "Failed to clean up temporary file"),
    }
}
