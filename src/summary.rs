//! Aggregate interpretation of a spread.
//!
//! The summary is assembled from fixed templates selected by a handful of
//! computed features (major arcana count, reversed count, dominant suit), so
//! identical inputs always produce identical text.

use crate::deck::Suit;
use crate::draw::DrawnCard;
use crate::localization::{t_args_lang, t_lang};
use crate::session::{SpreadKind, Topic};

/// Features of a spread that select the summary templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadFeatures {
    pub total: usize,
    pub major_count: usize,
    pub reversed_count: usize,
    /// Most frequent suit; ties go to the earlier suit in [`Suit::ALL`]
    pub dominant_suit: Option<Suit>,
}

impl SpreadFeatures {
    pub fn from_cards(cards: &[DrawnCard]) -> Self {
        let major_count = cards.iter().filter(|d| d.card.is_major()).count();
        let reversed_count = cards.iter().filter(|d| d.is_reversed).count();

        let mut dominant_suit = None;
        let mut best = 0usize;
        for suit in Suit::ALL {
            let count = cards
                .iter()
                .filter(|d| d.card.suit() == Some(suit))
                .count();
            // strict comparison keeps the earlier suit on ties
            if count > best {
                best = count;
                dominant_suit = Some(suit);
            }
        }

        Self {
            total: cards.len(),
            major_count,
            reversed_count,
            dominant_suit,
        }
    }

    fn major_key(&self) -> &'static str {
        if self.major_count == 0 {
            "summary-major-none"
        } else if self.major_count * 2 > self.total {
            "summary-major-dominant"
        } else {
            "summary-major-some"
        }
    }

    fn reversed_key(&self) -> &'static str {
        if self.reversed_count == 0 {
            "summary-reversed-none"
        } else if self.reversed_count == self.total {
            "summary-reversed-all"
        } else {
            "summary-reversed-some"
        }
    }

    fn suit_key(&self) -> &'static str {
        match self.dominant_suit {
            Some(Suit::Wands) => "summary-suit-wands",
            Some(Suit::Cups) => "summary-suit-cups",
            Some(Suit::Swords) => "summary-suit-swords",
            Some(Suit::Pentacles) => "summary-suit-pentacles",
            None => "summary-suit-none",
        }
    }
}

pub fn spread_name(spread: SpreadKind, lang: &str) -> String {
    t_lang(&format!("spread-{}", spread.key()), Some(lang))
}

pub fn topic_name(topic: Topic, lang: &str) -> String {
    t_lang(&format!("topic-{}", topic.key()), Some(lang))
}

/// Render the summary of a drawn spread
pub fn summarize(
    spread: SpreadKind,
    topic: Topic,
    question: &str,
    cards: &[DrawnCard],
    lang: &str,
) -> String {
    let features = SpreadFeatures::from_cards(cards);
    let total = features.total.to_string();
    let majors = features.major_count.to_string();
    let reversed = features.reversed_count.to_string();
    let spread_label = spread_name(spread, lang);
    let topic_label = topic_name(topic, lang);

    let mut lines = vec![
        t_args_lang(
            "summary-header",
            &[("spread", &spread_label), ("topic", &topic_label)],
            Some(lang),
        ),
    ];

    let question = question.trim();
    if !question.is_empty() {
        lines.push(t_args_lang(
            "summary-question",
            &[("question", question)],
            Some(lang),
        ));
    }

    lines.push(t_args_lang(
        features.major_key(),
        &[("count", &majors), ("total", &total)],
        Some(lang),
    ));
    lines.push(t_args_lang(
        features.reversed_key(),
        &[("count", &reversed), ("total", &total)],
        Some(lang),
    ));
    lines.push(t_lang(features.suit_key(), Some(lang)));
    lines.push(t_lang(&format!("summary-topic-{}", topic.key()), Some(lang)));
    lines.push(t_lang("summary-disclaimer", Some(lang)));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Card;
    use std::sync::Arc;

    fn drawn(code: &str, is_reversed: bool) -> DrawnCard {
        DrawnCard::new(
            Arc::new(Card {
                code: code.to_string(),
                title: code.to_string(),
                title_ru: None,
                upright_text: String::new(),
                reversed_text: String::new(),
                image_ref: String::new(),
            }),
            is_reversed,
        )
    }

    #[test]
    fn test_features() {
        let cards = vec![
            drawn("major_10", true),
            drawn("cups_02", false),
            drawn("cups_09", true),
        ];
        let features = SpreadFeatures::from_cards(&cards);
        assert_eq!(features.total, 3);
        assert_eq!(features.major_count, 1);
        assert_eq!(features.reversed_count, 2);
        assert_eq!(features.dominant_suit, Some(Suit::Cups));
    }

    #[test]
    fn test_suit_tie_break_is_fixed() {
        let cards = vec![drawn("swords_02", false), drawn("wands_05", false)];
        for _ in 0..10 {
            assert_eq!(
                SpreadFeatures::from_cards(&cards).dominant_suit,
                Some(Suit::Wands)
            );
        }

        let reordered = vec![drawn("pentacles_01", false), drawn("cups_07", false)];
        assert_eq!(
            SpreadFeatures::from_cards(&reordered).dominant_suit,
            Some(Suit::Cups)
        );
    }

    #[test]
    fn test_no_suit_for_majors_only() {
        let cards = vec![drawn("major_00", false)];
        let features = SpreadFeatures::from_cards(&cards);
        assert_eq!(features.dominant_suit, None);
        assert_eq!(features.major_key(), "summary-major-dominant");
        assert_eq!(features.suit_key(), "summary-suit-none");
    }

    #[test]
    fn test_template_selection() {
        let none = SpreadFeatures::from_cards(&[drawn("cups_01", false), drawn("cups_02", false)]);
        assert_eq!(none.major_key(), "summary-major-none");
        assert_eq!(none.reversed_key(), "summary-reversed-none");

        let some = SpreadFeatures::from_cards(&[
            drawn("major_01", true),
            drawn("cups_02", false),
            drawn("wands_02", false),
        ]);
        assert_eq!(some.major_key(), "summary-major-some");
        assert_eq!(some.reversed_key(), "summary-reversed-some");

        let all = SpreadFeatures::from_cards(&[drawn("major_01", true)]);
        assert_eq!(all.reversed_key(), "summary-reversed-all");
    }

    #[test]
    fn test_summary_is_deterministic_and_mentions_inputs() {
        let cards = vec![
            drawn("major_19", false),
            drawn("pentacles_03", true),
            drawn("swords_04", false),
        ];
        let first = summarize(
            SpreadKind::Three,
            Topic::Money,
            "will I get the raise?",
            &cards,
            "en",
        );
        let second = summarize(
            SpreadKind::Three,
            Topic::Money,
            "will I get the raise?",
            &cards,
            "en",
        );
        assert_eq!(first, second);
        assert!(first.contains("will I get the raise?"));
        assert!(!first.contains("Missing translation"));

        let russian = summarize(SpreadKind::One, Topic::Work, "что дальше?", &cards[..1], "ru");
        assert!(russian.contains("что дальше?"));
        assert!(!russian.contains("Missing translation"));
    }
}
