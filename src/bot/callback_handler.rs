//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::localization::detect_language;
use crate::session::UserKey;

use super::commands::classify_callback;
use super::dialogue_manager::apply_input;
use super::BotState;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: teloxide::types::CallbackQuery,
    state: Arc<BotState>,
) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    // Answer the callback query to remove the loading state
    bot.answer_callback_query(q.id.clone()).await?;

    let user = UserKey(q.from.id.0 as i64);
    let lang = detect_language(q.from.language_code.as_deref());
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .unwrap_or(ChatId(user.0));

    match q.data.as_deref().and_then(classify_callback) {
        Some(input) => apply_input(&bot, chat_id, &state, user, input, lang).await?,
        None => debug!(user_id = %user, data = ?q.data, "Ignoring unknown callback data"),
    }

    Ok(())
}
