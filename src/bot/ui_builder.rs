//! UI Builder module for creating keyboards and menus

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::dialogue::{Personality, TranslationLanguage};
use crate::localization::Translator;

use super::callback_handler::Callback;
use super::message_handler::Command;

/// One inline button: visible label and callback payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, callback: Callback) -> Self {
        Self {
            label: label.into(),
            payload: callback.payload(),
        }
    }
}

/// Inline keyboard with one button per row
pub fn create_keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(buttons.iter().map(|button| {
        vec![InlineKeyboardButton::callback(
            button.label.clone(),
            button.payload.clone(),
        )]
    }))
}

/// `(command, description)` pairs for the per-chat command menu
pub fn main_menu_commands(tr: &Translator<'_>) -> Vec<(String, String)> {
    Command::ALL
        .iter()
        .map(|command| (command.name().to_string(), tr.t(command.menu_key())))
        .collect()
}

fn end_button(tr: &Translator<'_>) -> Button {
    Button::new(tr.t("button-end"), Callback::Start)
}

pub fn random_fact_buttons(tr: &Translator<'_>) -> Vec<Button> {
    vec![Button::new(tr.t("random-more"), Callback::Random), end_button(tr)]
}

pub fn personality_picker(tr: &Translator<'_>) -> Vec<Button> {
    Personality::ALL
        .iter()
        .map(|p| Button::new(p.label(), Callback::Talk(*p)))
        .chain(std::iter::once(end_button(tr)))
        .collect()
}

/// Single end button under personality replies
pub fn end_only(tr: &Translator<'_>) -> Vec<Button> {
    vec![end_button(tr)]
}

pub fn language_picker(tr: &Translator<'_>) -> Vec<Button> {
    TranslationLanguage::ALL
        .iter()
        .map(|l| Button::new(l.label(), Callback::Translate(*l)))
        .chain(std::iter::once(end_button(tr)))
        .collect()
}

pub fn translation_reply_buttons(tr: &Translator<'_>) -> Vec<Button> {
    vec![
        Button::new(tr.t("translator-change"), Callback::Translator),
        end_button(tr),
    ]
}

pub fn resume_controls(tr: &Translator<'_>) -> Vec<Button> {
    vec![
        Button::new(tr.t("resume-restart"), Callback::ResumeRestart),
        Button::new(tr.t("resume-cancel"), Callback::ResumeCancel),
        Button::new(tr.t("resume-back"), Callback::Start),
    ]
}
