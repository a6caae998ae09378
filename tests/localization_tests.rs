//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval and formatting with various edge cases.

use assistant_bot::intent::{FALLBACK_HINT_KEY, FALLBACK_KEYS};
use assistant_bot::localization::{LocalizationManager, SUPPORTED_LANGUAGES};
use assistant_bot::resume::RESUME_FIELDS;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    fn assert_present(manager: &LocalizationManager, key: &str) {
        for language in SUPPORTED_LANGUAGES {
            let message = manager.get_message_in_language(key, language, None);
            assert!(
                !message.starts_with("Missing"),
                "{key} is missing in {language}"
            );
            assert!(!message.trim().is_empty(), "{key} is empty in {language}");
        }
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("button-end", "en", None);
        assert_eq!(message, "Finish");
        let message = manager.get_message_in_language("button-end", "uk", None);
        assert_eq!(message, "Закінчити");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("button-end", "unsupported", None);
        // Falls back to Ukrainian
        assert_eq!(message, "Закінчити");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("name", "Guido Van Rossum");

        let message = manager.get_message_in_language("talk-greeting", "en", Some(&args));
        assert!(message.starts_with("Hello, I`m Guido Van Rossum."));
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        // Missing arguments are reported by fluent but still produce text
        let message = manager.get_message_in_language("translator-send-text", "en", None);
        assert!(!message.is_empty());
    }

    #[test]
    fn test_every_flow_key_is_translated() {
        let manager = setup_localization();

        let keys = [
            "menu-start",
            "menu-random",
            "menu-gpt",
            "menu-talk",
            "menu-translator",
            "menu-resume",
            "image-unavailable",
            "unsupported-message",
            "random-searching",
            "random-question",
            "random-error",
            "gpt-ask",
            "gpt-error",
            "talk-choose",
            "talk-choose-first",
            "talk-error",
            "translator-choose",
            "translator-choose-first",
            "translator-waiting",
            "translator-change",
            "translator-error",
            "intent-random",
            "intent-gpt",
            "intent-talk",
            "intent-translator",
            "resume-restart",
            "resume-cancel",
            "resume-back",
            "resume-photo-retry",
            "resume-text-retry",
            "resume-wait",
            "resume-error",
            "resume-cancelled",
            "resume-instruction",
        ];
        for key in keys {
            assert_present(&manager, key);
        }
        for key in FALLBACK_KEYS {
            assert_present(&manager, key);
        }
        assert_present(&manager, FALLBACK_HINT_KEY);
        for field in RESUME_FIELDS {
            assert_present(&manager, &field.prompt_key());
        }
    }

    #[test]
    fn test_language_detection() {
        use assistant_bot::localization::detect_language;

        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(Some("uk")), "uk");
        assert_eq!(detect_language(Some("UK_ua")), "uk");
        assert_eq!(detect_language(None), "uk"); // Default to Ukrainian
        assert_eq!(detect_language(Some("fr")), "uk"); // Unsupported falls back
    }

    #[test]
    fn test_translator_binds_language() {
        let manager = setup_localization();

        let english = manager.for_language(Some("en-GB"));
        assert_eq!(english.language(), "en");
        assert_eq!(
            english.t_args("translator-result", &[("language", "Deutsch")]),
            "🌍 Translation (Deutsch):"
        );

        let ukrainian = manager.for_language(None);
        assert_eq!(ukrainian.t("button-end"), "Закінчити");
    }
}
