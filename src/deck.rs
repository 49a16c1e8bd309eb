//! # Deck Module
//!
//! Static card catalog: parsing, validation and card classification.
//! A deck is loaded once at startup and shared read-only afterwards.

use log::warn;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::TarotError;

pub const DEFAULT_REVERSAL_PERCENT: u8 = 30;

/// Minor arcana suit, declared in tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    pub fn key(self) -> &'static str {
        match self {
            Suit::Wands => "wands",
            Suit::Cups => "cups",
            Suit::Swords => "swords",
            Suit::Pentacles => "pentacles",
        }
    }
}

/// Major or minor arcana membership of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arcana {
    Major,
    Minor(Option<Suit>),
}

/// A single card of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub code: String,
    pub title: String,
    pub title_ru: Option<String>,
    pub upright_text: String,
    pub reversed_text: String,
    pub image_ref: String,
}

impl Card {
    /// Classify the card from its code prefix (`major_`, `wands_`, ...)
    pub fn arcana(&self) -> Arcana {
        let prefix = self
            .code
            .split(['_', '-'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match prefix.as_str() {
            "major" | "maj" => Arcana::Major,
            "wands" | "wand" => Arcana::Minor(Some(Suit::Wands)),
            "cups" | "cup" => Arcana::Minor(Some(Suit::Cups)),
            "swords" | "sword" => Arcana::Minor(Some(Suit::Swords)),
            "pentacles" | "pentacle" | "coins" => Arcana::Minor(Some(Suit::Pentacles)),
            _ => Arcana::Minor(None),
        }
    }

    pub fn is_major(&self) -> bool {
        self.arcana() == Arcana::Major
    }

    pub fn suit(&self) -> Option<Suit> {
        match self.arcana() {
            Arcana::Minor(suit) => suit,
            Arcana::Major => None,
        }
    }

    /// Display title for a language, falling back to the default title
    pub fn title_for(&self, lang: &str) -> &str {
        match (lang, &self.title_ru) {
            ("ru", Some(title_ru)) => title_ru,
            _ => &self.title,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name_en: Option<String>,
    #[serde(default)]
    name_ru: Option<String>,
    /// Absent: default percentage; explicit `null`: no reversals
    #[serde(default, deserialize_with = "present")]
    reversals_percent: Option<Option<i64>>,
    #[serde(default)]
    image_base_url: Option<String>,
    #[serde(default)]
    cards: Vec<CardRecord>,
}

#[derive(Debug, Deserialize)]
struct CardRecord {
    code: String,
    #[serde(default)]
    title_en: Option<String>,
    #[serde(default)]
    title_ru: Option<String>,
    #[serde(default)]
    upright: Option<String>,
    #[serde(default)]
    reversed: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<CardRecord> for Card {
    fn from(record: CardRecord) -> Self {
        let code = record.code.trim().to_string();
        let title_ru = non_blank(record.title_ru);
        let title = non_blank(record.title_en)
            .or_else(|| title_ru.clone())
            .unwrap_or_else(|| code.clone());

        Card {
            code,
            title,
            title_ru,
            upright_text: non_blank(record.upright).unwrap_or_default(),
            reversed_text: non_blank(record.reversed).unwrap_or_default(),
            image_ref: non_blank(record.image).unwrap_or_default(),
        }
    }
}

/// Ordered collection of unique cards plus deck-level settings
#[derive(Debug, Clone, Default)]
pub struct Deck {
    pub name: String,
    pub name_ru: Option<String>,
    cards: Vec<Arc<Card>>,
    reversal_probability: u8,
    pub image_base_url: String,
}

impl Deck {
    /// Build a deck, rejecting duplicate card codes
    pub fn new(
        name: impl Into<String>,
        cards: Vec<Card>,
        reversal_probability: u8,
        image_base_url: impl Into<String>,
    ) -> Result<Self, TarotError> {
        let mut seen = HashSet::new();
        for card in &cards {
            if card.code.is_empty() {
                return Err(TarotError::InvalidCatalog("card without code".to_string()));
            }
            if !seen.insert(card.code.as_str()) {
                return Err(TarotError::InvalidCatalog(format!(
                    "duplicate card code: {}",
                    card.code
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            name_ru: None,
            cards: cards.into_iter().map(Arc::new).collect(),
            reversal_probability: reversal_probability.min(100),
            image_base_url: image_base_url.into(),
        })
    }

    /// A deck without cards; every draw from it reports `DeckUnavailable`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON catalog
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, TarotError> {
        let record: CatalogRecord = serde_json::from_slice(bytes)?;

        let percent = match record.reversals_percent {
            None => i64::from(DEFAULT_REVERSAL_PERCENT),
            Some(value) => value.unwrap_or(0),
        };
        if !(0..=100).contains(&percent) {
            warn!("Catalog reversals_percent {percent} is outside 0..=100, clamping");
        }

        let name = non_blank(record.name_en)
            .or_else(|| record.name_ru.clone())
            .or(record.code)
            .unwrap_or_else(|| "deck".to_string());

        let mut deck = Deck::new(
            name,
            record.cards.into_iter().map(Card::from).collect(),
            percent.clamp(0, 100) as u8,
            non_blank(record.image_base_url).unwrap_or_default(),
        )?;
        deck.name_ru = non_blank(record.name_ru);
        Ok(deck)
    }

    pub fn cards(&self) -> &[Arc<Card>] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Probability (0-100) that a drawn card is reversed
    pub fn reversal_probability(&self) -> u8 {
        self.reversal_probability
    }

    pub fn find(&self, code: &str) -> Option<&Arc<Card>> {
        self.cards.iter().find(|card| card.code == code)
    }

    pub fn name_for(&self, lang: &str) -> &str {
        match (lang, &self.name_ru) {
            ("ru", Some(name_ru)) => name_ru,
            _ => &self.name,
        }
    }

    /// Absolute image URL of a card, if both base and image are known
    pub fn image_url(&self, card: &Card) -> Option<String> {
        let base = self.image_base_url.trim();
        let image = card.image_ref.trim();
        if base.is_empty() || image.is_empty() {
            return None;
        }

        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            image.trim_start_matches('/')
        ))
    }
}
