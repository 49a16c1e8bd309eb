//! Classification of raw Telegram text and callback data into typed events.
//!
//! Everything downstream of this module works on [`BotCommand`] and
//! [`UserInput`] values, never on raw strings.

use crate::session::{SpreadKind, Topic};
use crate::state_machine::UserInput;

pub const CALLBACK_CANCEL: &str = "cancel";
const CALLBACK_SPREAD_PREFIX: &str = "spread:";
const CALLBACK_TOPIC_PREFIX: &str = "topic:";

/// Slash commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Deck,
    One,
    Three,
    Cancel,
    History,
}

impl BotCommand {
    /// Parse `/command`, `/command@BotName` and `/command args`
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();

        match name.as_str() {
            "start" | "menu" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "deck" => Some(BotCommand::Deck),
            "one" => Some(BotCommand::One),
            "three" => Some(BotCommand::Three),
            "cancel" => Some(BotCommand::Cancel),
            "history" => Some(BotCommand::History),
            _ => None,
        }
    }
}

/// A classified inbound text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Command(BotCommand),
    Input(UserInput),
    /// A slash command the bot does not know
    UnknownCommand,
}

/// Classify a text message
pub fn classify_text(text: &str) -> GatewayEvent {
    let trimmed = text.trim();

    if trimmed.starts_with('/') {
        return match BotCommand::parse(trimmed) {
            Some(command) => GatewayEvent::Command(command),
            None => GatewayEvent::UnknownCommand,
        };
    }

    match trimmed.to_lowercase().as_str() {
        "cancel" | "stop" | "отмена" | "стоп" => GatewayEvent::Input(UserInput::Cancel),
        _ => GatewayEvent::Input(UserInput::Text(text.to_string())),
    }
}

/// Classify inline keyboard callback data
pub fn classify_callback(data: &str) -> Option<UserInput> {
    if data == CALLBACK_CANCEL {
        return Some(UserInput::Cancel);
    }
    if let Some(key) = data.strip_prefix(CALLBACK_SPREAD_PREFIX) {
        return SpreadKind::from_key(key).map(UserInput::ChooseSpread);
    }
    if let Some(key) = data.strip_prefix(CALLBACK_TOPIC_PREFIX) {
        return Topic::from_key(key).map(UserInput::ChooseTopic);
    }
    None
}

pub fn spread_callback(spread: SpreadKind) -> String {
    format!("{CALLBACK_SPREAD_PREFIX}{}", spread.key())
}

pub fn topic_callback(topic: Topic) -> String {
    format!("{CALLBACK_TOPIC_PREFIX}{}", topic.key())
}
