//! Turns a completed request into a reading: draw, assign positions, summarize.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::deck::Deck;
use crate::draw::{draw, render_meaning, DrawnCard};
use crate::errors::TarotError;
use crate::localization::t_lang;
use crate::state_machine::CompletedRequest;
use crate::summary::summarize;

/// A drawn card in its spread position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedCard {
    /// Localization key of the position (`position-past`, ...)
    pub position: &'static str,
    pub drawn: DrawnCard,
}

impl PositionedCard {
    pub fn position_label(&self, lang: &str) -> String {
        t_lang(self.position, Some(lang))
    }

    pub fn meaning(&self, lang: &str) -> String {
        render_meaning(&self.drawn, lang)
    }
}

/// Outcome of one reading, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub request: CompletedRequest,
    pub cards: Vec<PositionedCard>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Draws readings from a shared, read-only deck
#[derive(Debug, Clone)]
pub struct TarotReader {
    deck: Arc<Deck>,
}

impl TarotReader {
    pub fn new(deck: Arc<Deck>) -> Self {
        Self { deck }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Draw the cards of `request` with `rng` and render its summary in `lang`
    pub fn read_with<R: Rng + ?Sized>(
        &self,
        request: &CompletedRequest,
        lang: &str,
        rng: &mut R,
    ) -> Result<Reading, TarotError> {
        let positions = request.spread_kind.positions();
        let drawn = draw(&self.deck, positions.len(), rng)?;

        let summary = summarize(
            request.spread_kind,
            request.topic,
            &request.question,
            &drawn,
            lang,
        );

        let cards = positions
            .iter()
            .zip(drawn)
            .map(|(&position, drawn)| PositionedCard {
                position,
                drawn,
            })
            .collect();

        Ok(Reading {
            request: request.clone(),
            cards,
            summary,
            created_at: Utc::now(),
        })
    }

    /// Draw with the thread-local generator
    pub fn read(&self, request: &CompletedRequest, lang: &str) -> Result<Reading, TarotError> {
        self.read_with(request, lang, &mut rand::thread_rng())
    }
}
