//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::localization::{detect_language, t_lang};
use crate::session::{SpreadKind, UserKey};
use crate::state_machine::{Prompt, UserInput};

use super::commands::{classify_text, BotCommand, GatewayEvent};
use super::dialogue_manager::{apply_input, send_prompt};
use super::ui_builder::{format_deck_info, format_help, format_history, format_welcome};
use super::BotState;

/// User key of the sender, falling back to the chat for anonymous senders
pub fn sender_key(msg: &Message) -> UserKey {
    match msg.from.as_ref() {
        Some(user) => UserKey(user.id.0 as i64),
        None => UserKey(msg.chat.id.0),
    }
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    command: BotCommand,
    user: UserKey,
    lang: &str,
) -> Result<()> {
    debug!(user_id = %user, command = ?command, "Received command");

    match command {
        BotCommand::Start => {
            state.machine.cancel(user).await;
            bot.send_message(msg.chat.id, format_welcome(lang)).await?;
            send_prompt(bot, msg.chat.id, state, Prompt::ChooseSpread, None, lang).await?;
        }
        BotCommand::Help => {
            bot.send_message(msg.chat.id, format_help(lang)).await?;
        }
        BotCommand::Deck => {
            bot.send_message(msg.chat.id, format_deck_info(state.reader.deck(), lang))
                .await?;
        }
        BotCommand::One => {
            let input = UserInput::ChooseSpread(SpreadKind::One);
            apply_input(bot, msg.chat.id, state, user, input, lang).await?;
        }
        BotCommand::Three => {
            let input = UserInput::ChooseSpread(SpreadKind::Three);
            apply_input(bot, msg.chat.id, state, user, input, lang).await?;
        }
        BotCommand::Cancel => {
            apply_input(bot, msg.chat.id, state, user, UserInput::Cancel, lang).await?;
        }
        BotCommand::History => {
            let text = match state.history.recent(user, state.history_limit).await {
                Ok(entries) => format_history(&entries, state.reader.deck(), lang),
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Failed to load reading history");
                    t_lang("history-unavailable", Some(lang))
                }
            };
            bot.send_message(msg.chat.id, text).await?;
        }
    }

    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<()> {
    let lang = detect_language(
        msg.from
            .as_ref()
            .and_then(|user| user.language_code.as_deref()),
    );
    let user = sender_key(&msg);

    let Some(text) = msg.text() else {
        debug!(user_id = %user, "Received unsupported message type from user");
        bot.send_message(msg.chat.id, t_lang("unsupported-message", Some(lang)))
            .await?;
        return Ok(());
    };

    debug!(user_id = %user, message_length = text.len(), "Received text message from user");

    match classify_text(text) {
        GatewayEvent::Command(command) => {
            handle_command(&bot, &msg, &state, command, user, lang).await?;
        }
        GatewayEvent::Input(input) => {
            apply_input(&bot, msg.chat.id, &state, user, input, lang).await?;
        }
        GatewayEvent::UnknownCommand => {
            bot.send_message(msg.chat.id, t_lang("unknown-command", Some(lang)))
                .await?;
        }
    }

    Ok(())
}
