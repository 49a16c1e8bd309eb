//! # Draw Module
//!
//! Without-replacement sampling of cards and per-card orientation rolls,
//! plus rendering of the meaning text of a drawn card.

use rand::seq::index;
use rand::Rng;
use std::sync::Arc;

use crate::deck::{Card, Deck};
use crate::errors::TarotError;
use crate::localization::t_args_lang;

/// A card drawn for one reading, with its orientation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnCard {
    pub card: Arc<Card>,
    pub is_reversed: bool,
}

impl DrawnCard {
    pub fn new(card: Arc<Card>, is_reversed: bool) -> Self {
        Self { card, is_reversed }
    }

    /// Title with an orientation marker for reversed cards
    pub fn display_title(&self, lang: &str) -> String {
        let title = self.card.title_for(lang);
        if self.is_reversed {
            t_args_lang("card-title-reversed", &[("title", title)], Some(lang))
        } else {
            title.to_string()
        }
    }
}

/// Roll the orientation of one card: reversed with probability `percent / 100`
pub fn roll_orientation<R: Rng + ?Sized>(percent: u8, rng: &mut R) -> bool {
    rng.gen_range(1..=100u8) <= percent
}

/// Draw `n` distinct cards uniformly at random
///
/// Either returns exactly `n` cards with pairwise-distinct codes or fails
/// without drawing anything.
pub fn draw<R: Rng + ?Sized>(
    deck: &Deck,
    n: usize,
    rng: &mut R,
) -> Result<Vec<DrawnCard>, TarotError> {
    if deck.is_empty() {
        return Err(TarotError::DeckUnavailable);
    }
    if n > deck.len() {
        return Err(TarotError::InsufficientCards {
            requested: n,
            available: deck.len(),
        });
    }

    let cards = deck.cards();
    let picks = index::sample(rng, cards.len(), n);

    Ok(picks
        .into_iter()
        .map(|i| {
            let is_reversed = roll_orientation(deck.reversal_probability(), rng);
            DrawnCard::new(Arc::clone(&cards[i]), is_reversed)
        })
        .collect())
}

/// Meaning text for the drawn orientation; never empty
pub fn render_meaning(drawn: &DrawnCard, lang: &str) -> String {
    let text = if drawn.is_reversed {
        drawn.card.reversed_text.trim()
    } else {
        drawn.card.upright_text.trim()
    };

    if !text.is_empty() {
        return text.to_string();
    }

    let key = if drawn.is_reversed {
        "meaning-fallback-reversed"
    } else {
        "meaning-fallback-upright"
    };
    let fallback = t_args_lang(key, &[("title", drawn.card.title_for(lang))], Some(lang));
    if fallback.trim().is_empty() {
        format!("{} ({})", drawn.card.title_for(lang), key)
    } else {
        fallback
    }
}
