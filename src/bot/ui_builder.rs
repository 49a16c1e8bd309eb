//! UI Builder module for creating keyboards and formatting messages

use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

use crate::deck::Deck;
use crate::history::HistoryEntry;
use crate::localization::{t_args_lang, t_lang};
use crate::reading::PositionedCard;
use crate::session::{SpreadKind, Topic};
use crate::state_machine::Prompt;
use crate::summary::{spread_name, topic_name};

use super::commands::{spread_callback, topic_callback, CALLBACK_CANCEL};

/// Telegram limit for photo captions, in visible characters
pub const MAX_CAPTION_CHARS: usize = 1024;

fn cancel_button(lang: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(format!("❌ {}", t_lang("cancel", Some(lang))), CALLBACK_CANCEL)
}

/// Keyboard offering the spreads the deck can serve
pub fn create_spread_keyboard(available: &[SpreadKind], lang: &str) -> InlineKeyboardMarkup {
    let buttons = available
        .iter()
        .map(|spread| {
            vec![InlineKeyboardButton::callback(
                format!("🃏 {}", spread_name(*spread, lang)),
                spread_callback(*spread),
            )]
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(buttons)
}

/// Keyboard with one button per topic plus cancel
pub fn create_topic_keyboard(lang: &str) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = Topic::ALL
        .iter()
        .map(|topic| {
            vec![InlineKeyboardButton::callback(
                format!("{} {}", topic_icon(*topic), topic_name(*topic, lang)),
                topic_callback(*topic),
            )]
        })
        .collect();
    buttons.push(vec![cancel_button(lang)]);

    InlineKeyboardMarkup::new(buttons)
}

pub fn create_cancel_keyboard(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![cancel_button(lang)]])
}

pub fn topic_icon(topic: Topic) -> &'static str {
    match topic {
        Topic::Relationships => "❤️",
        Topic::Work => "💼",
        Topic::Money => "💰",
    }
}

/// Text and keyboard for a prompt
pub fn format_prompt(
    prompt: Prompt,
    available: &[SpreadKind],
    lang: &str,
) -> (String, InlineKeyboardMarkup) {
    match prompt {
        Prompt::ChooseSpread => (
            t_lang("prompt-choose-spread", Some(lang)),
            create_spread_keyboard(available, lang),
        ),
        Prompt::ChooseTopic { spread } => (
            t_args_lang(
                "prompt-choose-topic",
                &[("spread", &spread_name(spread, lang))],
                Some(lang),
            ),
            create_topic_keyboard(lang),
        ),
        Prompt::AskQuestion { topic, .. } => (
            t_args_lang(
                "prompt-ask-question",
                &[("topic", &topic_name(topic, lang))],
                Some(lang),
            ),
            create_cancel_keyboard(lang),
        ),
    }
}

/// Human readable wait time, rounded up to whole seconds
pub fn format_cooldown(remaining: Duration, lang: &str) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    let (minutes, seconds) = (secs / 60, secs % 60);
    let wait = if minutes > 0 {
        t_args_lang(
            "duration-minutes-seconds",
            &[("minutes", &minutes.to_string()), ("seconds", &seconds.to_string())],
            Some(lang),
        )
    } else {
        t_args_lang("duration-seconds", &[("seconds", &seconds.to_string())], Some(lang))
    };

    t_args_lang("cooldown-wait", &[("wait", &wait)], Some(lang))
}

pub fn format_welcome(lang: &str) -> String {
    [
        format!("🔮 {}", t_lang("welcome-title", Some(lang))),
        t_lang("welcome-description", Some(lang)),
        t_lang("welcome-commands", Some(lang)),
    ]
    .join("\n\n")
}

pub fn format_help(lang: &str) -> String {
    [
        t_lang("help-title", Some(lang)),
        t_lang("help-spreads", Some(lang)),
        t_lang("help-flow", Some(lang)),
        t_lang("help-commands", Some(lang)),
        t_lang("help-disclaimer", Some(lang)),
    ]
    .join("\n\n")
}

pub fn format_deck_info(deck: &Deck, lang: &str) -> String {
    if deck.is_empty() {
        return t_lang("deck-unavailable", Some(lang));
    }
    t_args_lang(
        "deck-info",
        &[
            ("name", deck.name_for(lang)),
            ("count", &deck.len().to_string()),
            ("reversals", &deck.reversal_probability().to_string()),
        ],
        Some(lang),
    )
}

/// HTML caption of one card: bold position and title, then the meaning
///
/// The meaning is shortened so the visible text fits `max_chars`.
pub fn format_card_caption(card: &PositionedCard, lang: &str, max_chars: usize) -> String {
    let header = format!(
        "{}: {}",
        card.position_label(lang),
        card.drawn.display_title(lang)
    );
    let meaning = card.meaning(lang);

    let budget = max_chars.saturating_sub(header.chars().count() + 1);
    let meaning = truncate_chars(&meaning, budget);

    if meaning.is_empty() {
        format!("<b>{}</b>", html::escape(&header))
    } else {
        format!("<b>{}</b>\n{}", html::escape(&header), html::escape(&meaning))
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut truncated: String = text.chars().take(max - 1).collect();
    truncated.push('…');
    truncated
}

pub fn format_history(entries: &[HistoryEntry], deck: &Deck, lang: &str) -> String {
    if entries.is_empty() {
        return t_lang("history-empty", Some(lang));
    }

    let mut result = t_lang("history-title", Some(lang));
    result.push('\n');

    for (i, entry) in entries.iter().enumerate() {
        let cards = entry
            .cards
            .iter()
            .map(|c| {
                let title = deck
                    .find(&c.code)
                    .map(|card| card.title_for(lang).to_string())
                    .unwrap_or_else(|| c.code.clone());
                if c.is_reversed {
                    t_args_lang("card-title-reversed", &[("title", &title)], Some(lang))
                } else {
                    title
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        result.push_str(&format!(
            "\n{}. {} · {} {} · «{}»\n   {}",
            i + 1,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            topic_icon(entry.topic),
            spread_name(entry.spread_kind, lang),
            entry.question,
            cards
        ));
    }

    result
}
