//! # Assistant Telegram Bot
//!
//! A Telegram assistant backed by a chat-completion model: random facts,
//! free-form questions, role-play with famous personalities, translation and
//! a step-by-step resume builder that replies with a PDF.

pub mod bot;
pub mod circuit_breaker;
pub mod completion;
pub mod config;
pub mod dialogue;
pub mod errors;
pub mod intent;
pub mod localization;
pub mod resources;
pub mod resume;
pub mod resume_pdf;
