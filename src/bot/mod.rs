//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `commands`: Classifies raw text and callback data into typed events
//! - `message_handler`: Handles incoming text messages and commands
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `dialogue_manager`: Applies inputs to the state machine and replies
//! - `delivery`: Sends readings as photos with a text fallback
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod commands;
pub mod delivery;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use crate::history::HistoryStore;
use crate::reading::TarotReader;
use crate::session::InMemorySessionStore;
use crate::state_machine::TarotStateMachine;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// Shared state handed to every update handler
pub struct BotState {
    pub machine: TarotStateMachine<InMemorySessionStore>,
    pub reader: TarotReader,
    pub history: Arc<dyn HistoryStore>,
    pub history_limit: usize,
}
