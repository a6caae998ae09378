//! Per-chat conversation state and the store that owns it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tracing::debug;

use crate::completion::Conversation;
use crate::resume::ResumeForm;

/// Famous people the talk flow can impersonate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Personality {
    LinusTorvalds,
    GuidoVanRossum,
    MarkZuckerberg,
}

impl Personality {
    pub const ALL: [Personality; 3] = [
        Personality::LinusTorvalds,
        Personality::GuidoVanRossum,
        Personality::MarkZuckerberg,
    ];

    /// Callback payload, prompt name and image name at once
    pub fn id(self) -> &'static str {
        match self {
            Personality::LinusTorvalds => "talk_linus_torvalds",
            Personality::GuidoVanRossum => "talk_guido_van_rossum",
            Personality::MarkZuckerberg => "talk_mark_zuckerberg",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Picker label
    pub fn label(self) -> &'static str {
        match self {
            Personality::LinusTorvalds => "Linus Torvalds (Linux, Git)",
            Personality::GuidoVanRossum => "Guido van Rossum (Python)",
            Personality::MarkZuckerberg => "Mark Zuckerberg (Meta, Facebook)",
        }
    }

    /// Name shown in front of replies, title-cased from the identifier
    pub fn display_name(self) -> String {
        title_case(&self.id().trim_start_matches("talk_").replace('_', " "))
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Target languages of the translator flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranslationLanguage {
    English,
    Ukrainian,
    German,
}

impl TranslationLanguage {
    pub const ALL: [TranslationLanguage; 3] = [
        TranslationLanguage::English,
        TranslationLanguage::Ukrainian,
        TranslationLanguage::German,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TranslationLanguage::English => "en",
            TranslationLanguage::Ukrainian => "uk",
            TranslationLanguage::German => "de",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TranslationLanguage::English => "English",
            TranslationLanguage::Ukrainian => "Українська",
            TranslationLanguage::German => "Deutsch",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TranslationLanguage::English => "English 🇬🇧",
            TranslationLanguage::Ukrainian => "Українська 🇺🇦",
            TranslationLanguage::German => "Deutsch 🇩🇪",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code)
    }
}

/// Which flow currently owns free-text input, with the flow's collected data
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ConversationState {
    #[default]
    None,
    Gpt,
    Talk {
        personality: Option<Personality>,
    },
    Translator {
        language: Option<TranslationLanguage>,
    },
    Resume(ResumeForm),
}

impl ConversationState {
    /// Short tag for logs
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::None => "none",
            ConversationState::Gpt => "gpt",
            ConversationState::Talk { .. } => "talk",
            ConversationState::Translator { .. } => "translator",
            ConversationState::Resume(_) => "resume",
        }
    }
}

/// Everything the bot remembers about one chat
#[derive(Debug)]
pub struct ChatSession {
    pub state: ConversationState,
    pub conversation: Conversation,
    last_active: Instant,
}

impl ChatSession {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: ConversationState::None,
            conversation: Conversation::new(max_history),
            last_active: Instant::now(),
        }
    }

    /// Forget the active flow, its data and the completion history
    pub fn clear(&mut self) {
        self.state = ConversationState::None;
        self.conversation.reset();
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Result of one idle sweep
#[derive(Debug, Default, PartialEq)]
pub struct Eviction {
    pub evicted: usize,
    pub temp_files: Vec<PathBuf>,
}

/// Chat id → session map; each session has its own async lock
pub struct SessionStore {
    sessions: StdMutex<HashMap<ChatId, SharedSession>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            max_history,
        }
    }

    /// Session for the chat, created on first use
    pub fn session(&self, chat_id: ChatId) -> SharedSession {
        let mut sessions = self.lock();
        sessions
            .entry(chat_id)
            .or_insert_with(|| {
                debug!(chat_id = %chat_id, "Creating chat session");
                Arc::new(Mutex::new(ChatSession::new(self.max_history)))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`; busy sessions are kept
    ///
    /// Downloaded resume photos of dropped sessions are returned for cleanup.
    pub fn evict_idle(&self, max_idle: Duration) -> Eviction {
        let mut sessions = self.lock();
        let mut eviction = Eviction::default();
        sessions.retain(|chat_id, session| {
            let Ok(guard) = session.try_lock() else {
                return true;
            };
            if guard.idle_for() < max_idle {
                return true;
            }
            if let ConversationState::Resume(form) = &guard.state {
                eviction.temp_files.extend(form.photo_path().map(PathBuf::from));
            }
            debug!(chat_id = %chat_id, "Evicting idle chat session");
            eviction.evicted += 1;
            false
        });
        eviction
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, SharedSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
