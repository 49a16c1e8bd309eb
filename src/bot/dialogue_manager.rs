//! Dialogue Manager module: applies typed inputs to the state machine and
//! turns the resulting transitions into replies.

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use crate::errors::TarotError;
use crate::history::HistoryEntry;
use crate::localization::{t_args_lang, t_lang};
use crate::session::UserKey;
use crate::state_machine::{CompletedRequest, Prompt, Transition, UserInput};
use crate::summary::spread_name;

use super::delivery::{deliver_reading, TelegramSink};
use super::ui_builder::{format_cooldown, format_prompt};
use super::BotState;

/// Send a prompt with its keyboard
pub async fn send_prompt(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    prompt: Prompt,
    prefix: Option<String>,
    lang: &str,
) -> Result<()> {
    let (text, keyboard) = format_prompt(prompt, state.machine.available_spreads(), lang);
    let text = match prefix {
        Some(prefix) => format!("{prefix}\n\n{text}"),
        None => text,
    };

    bot.send_message(chat_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Feed one input to the state machine and reply according to the outcome
pub async fn apply_input(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user: UserKey,
    input: UserInput,
    lang: &str,
) -> Result<()> {
    let transition = state.machine.handle_input(user, input, Utc::now()).await;

    match transition {
        Transition::Prompt(prompt) => {
            send_prompt(bot, chat_id, state, prompt, None, lang).await?;
        }
        Transition::Invalid(prompt) => {
            let prefix = t_lang("invalid-input", Some(lang));
            send_prompt(bot, chat_id, state, prompt, Some(prefix), lang).await?;
        }
        Transition::CoolingDown { remaining } => {
            bot.send_message(chat_id, format_cooldown(remaining, lang))
                .await?;
        }
        Transition::SpreadUnavailable(spread) => {
            let text = if state.reader.deck().is_empty() {
                t_lang("deck-unavailable", Some(lang))
            } else {
                t_args_lang(
                    "spread-unavailable",
                    &[("spread", &spread_name(spread, lang))],
                    Some(lang),
                )
            };
            bot.send_message(chat_id, text).await?;
        }
        Transition::Cancelled => {
            let prefix = t_lang("cancelled", Some(lang));
            send_prompt(bot, chat_id, state, Prompt::ChooseSpread, Some(prefix), lang).await?;
        }
        Transition::Completed(request) => {
            complete_reading(bot, chat_id, state, request, lang).await?;
        }
    }

    Ok(())
}

/// Draw, deliver and record a completed request
pub async fn complete_reading(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    request: CompletedRequest,
    lang: &str,
) -> Result<()> {
    let reading = match state.reader.read(&request, lang) {
        Ok(reading) => reading,
        Err(TarotError::DeckUnavailable) => {
            warn!(user_id = %request.user, "Reading requested while deck is unavailable");
            bot.send_message(chat_id, t_lang("deck-unavailable", Some(lang)))
                .await?;
            return Ok(());
        }
        Err(e) => {
            error!(user_id = %request.user, error = %e, "Failed to draw reading");
            bot.send_message(chat_id, t_lang("error-reading-failed", Some(lang)))
                .await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, t_lang("reading-intro", Some(lang)))
        .await?;

    let sink = TelegramSink::new(bot.clone(), chat_id);
    match deliver_reading(&sink, state.reader.deck(), &reading, lang).await {
        Ok(report) => info!(
            user_id = %request.user,
            photos = report.photos_sent,
            text_fallbacks = report.text_fallbacks,
            "Reading delivered"
        ),
        Err(e) => warn!(user_id = %request.user, error = %e, "Reading delivery failed"),
    }

    if let Err(e) = state.history.record(&HistoryEntry::from(&reading)).await {
        warn!(user_id = %request.user, error = %e, "Failed to store reading history");
    }

    Ok(())
}
