//! # Tarot Telegram Bot
//!
//! A Telegram bot that deals virtual tarot cards. A per-user state machine
//! collects the spread size, topic and question; the draw engine samples
//! cards from a static deck, rolls their orientation and renders a summary.

pub mod bot;
pub mod config;
pub mod cooldown;
pub mod deck;
pub mod deck_loader;
pub mod draw;
pub mod errors;
pub mod history;
pub mod localization;
pub mod reading;
pub mod session;
pub mod state_machine;
pub mod summary;
