//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Converts incoming messages and commands into engine events
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `ui_builder`: Creates keyboards and the command menu
//! - `dialogue_manager`: The conversation engine and its flows
//! - `transport`: Outbound Telegram calls behind the `ChatTransport` trait

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod transport;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use dialogue_manager::{Assistant, Inbound, InboundKind};
pub use transport::{ChatTransport, TelegramTransport};
