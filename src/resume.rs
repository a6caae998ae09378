//! # Resume Form Module
//!
//! The fixed sequence of questions asked by the resume flow, the progress of
//! one chat through it, and `{field}` interpolation of the resume prompt.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Kind of answer a resume step expects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Photo,
}

/// One question of the form
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResumeField {
    /// Key in the collected data and in the prompt template
    pub name: &'static str,
    pub kind: FieldKind,
}

impl ResumeField {
    /// Localization key of the question text
    pub fn prompt_key(&self) -> String {
        format!("resume-field-{}", self.name)
    }
}

pub const PHOTO_FIELD: &str = "photo";

/// Questions in the order they are asked
pub const RESUME_FIELDS: [ResumeField; 7] = [
    ResumeField { name: "specialty", kind: FieldKind::Text },
    ResumeField { name: PHOTO_FIELD, kind: FieldKind::Photo },
    ResumeField { name: "name", kind: FieldKind::Text },
    ResumeField { name: "projects", kind: FieldKind::Text },
    ResumeField { name: "education", kind: FieldKind::Text },
    ResumeField { name: "tech_skills", kind: FieldKind::Text },
    ResumeField { name: "soft_skills", kind: FieldKind::Text },
];

/// An answer received at some step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeAnswer {
    Text(String),
    /// Local path of a downloaded photo or image document
    Photo(String),
    /// Anything else (stickers, voice, a file that could not be downloaded)
    Other,
}

/// Result of feeding one answer to the form
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The answer does not fit the current step; the index is unchanged
    Rejected(ResumeField),
    /// Stored; the next question is this field
    Next(ResumeField),
    /// All fields collected
    Complete,
}

/// Progress of one chat through the form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResumeForm {
    step_index: usize,
    data: HashMap<String, String>,
}

impl ResumeForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Field currently awaiting an answer; `None` once complete
    pub fn current_field(&self) -> Option<ResumeField> {
        RESUME_FIELDS.get(self.step_index).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.step_index >= RESUME_FIELDS.len()
    }

    /// Store an answer for the current field and advance
    pub fn accept(&mut self, answer: ResumeAnswer) -> StepOutcome {
        let Some(field) = self.current_field() else {
            return StepOutcome::Complete;
        };

        let value = match (field.kind, answer) {
            (FieldKind::Text, ResumeAnswer::Text(text)) => text,
            (FieldKind::Photo, ResumeAnswer::Photo(path)) => path,
            _ => return StepOutcome::Rejected(field),
        };

        self.data.insert(field.name.to_string(), value);
        self.step_index += 1;

        match self.current_field() {
            Some(next) => StepOutcome::Next(next),
            None => StepOutcome::Complete,
        }
    }

    /// Path of the stored photo, if that step was answered
    pub fn photo_path(&self) -> Option<&str> {
        self.data.get(PHOTO_FIELD).map(String::as_str)
    }

    pub fn get(&self, field: &str) -> &str {
        self.data.get(field).map(String::as_str).unwrap_or_default()
    }
}

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern should be valid");
}

/// Replace `{field}` placeholders with values from `data`
///
/// Unknown keys are replaced by an empty string.
pub fn render_template(template: &str, data: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            data.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}
