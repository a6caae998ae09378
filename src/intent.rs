//! # Intent Module
//!
//! Keyword routing for free text received while no flow is active.
//! Rules are checked in order and the first rule with a keyword contained in
//! the lower-cased text wins.

use rand::seq::SliceRandom;
use rand::Rng;

/// Flow a free-text message was routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    RandomFact,
    Gpt,
    Talk,
    Translator,
}

impl Intent {
    /// Localization key of the notice sent before entering the flow
    pub fn notice_key(self) -> &'static str {
        match self {
            Intent::RandomFact => "intent-random",
            Intent::Gpt => "intent-gpt",
            Intent::Talk => "intent-talk",
            Intent::Translator => "intent-translator",
        }
    }
}

/// Ordered (keywords, intent) rules
pub const INTENT_RULES: &[(&[&str], Intent)] = &[
    (&["факт", "цікав", "random", "випадков"], Intent::RandomFact),
    (&["gpt", "чат", "питання", "запита", "дізнатися"], Intent::Gpt),
    (&["розмов", "говори", "спілкува", "особист", "talk"], Intent::Talk),
    (
        &[
            "переведи",
            "перевод",
            "переклади",
            "translate",
            "translation",
            "на англий",
            "на англій",
            "на немец",
            "на німец",
            "translator",
        ],
        Intent::Translator,
    ),
];

/// Route free text to a flow, `None` when no keyword matches
pub fn classify(text: &str) -> Option<Intent> {
    let lowered = text.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(_, intent)| *intent)
}

/// Localization keys of the "did not understand" replies
pub const FALLBACK_KEYS: &[&str] = &[
    "fallback-1",
    "fallback-2",
    "fallback-3",
    "fallback-4",
    "fallback-5",
    "fallback-6",
    "fallback-7",
    "fallback-8",
    "fallback-9",
    "fallback-10",
];

/// Localization key of the command hint appended to every fallback reply
pub const FALLBACK_HINT_KEY: &str = "fallback-hint";

/// Pick one fallback reply key
pub fn pick_fallback_key<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FALLBACK_KEYS.choose(rng).copied().unwrap_or(FALLBACK_KEYS[0])
}
