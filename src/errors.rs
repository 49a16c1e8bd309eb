//! # Tarot Error Types Module
//!
//! This module defines the error types used by the deck, draw and session
//! components. Most of them are recovered locally; none is fatal to the process.

use thiserror::Error;

/// Errors raised by the deck & draw engine and its edges
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TarotError {
    /// Neither the primary nor the fallback source produced a usable catalog
    #[error("Deck unavailable: no cards loaded")]
    DeckUnavailable,
    /// A draw asked for more cards than the deck holds
    #[error("Insufficient cards: requested {requested}, deck has {available}")]
    InsufficientCards { requested: usize, available: usize },
    /// The catalog could not be parsed or violates a deck invariant
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
    /// Reading the catalog bytes failed (I/O, HTTP, timeout)
    #[error("Deck source error: {0}")]
    DeckSource(String),
    /// A photo could not be delivered
    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),
    /// The session received input that is not valid for its current state
    #[error("Invalid input {input} in state {state}")]
    InvalidTransitionInput { state: String, input: String },
}

impl From<serde_json::Error> for TarotError {
    fn from(err: serde_json::Error) -> Self {
        TarotError::InvalidCatalog(err.to_string())
    }
}
