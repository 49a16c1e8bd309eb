//! # Deck Loader Module
//!
//! Reads the card catalog at startup: a local file first, then an optional
//! remote URL. When both fail the bot runs with an empty deck and tells
//! users to try later instead of crashing.

use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::deck::Deck;
use crate::errors::TarotError;

/// Where a catalog can be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckSource {
    File(PathBuf),
    Url { url: String, timeout: Duration },
}

impl std::fmt::Display for DeckSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckSource::File(path) => write!(f, "file {}", path.display()),
            DeckSource::Url { url, .. } => write!(f, "url {url}"),
        }
    }
}

/// Read the raw catalog bytes from a source
pub async fn fetch_source(source: &DeckSource) -> Result<Vec<u8>, TarotError> {
    match source {
        DeckSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| TarotError::DeckSource(format!("{}: {e}", path.display()))),
        DeckSource::Url { url, timeout } => {
            let client = reqwest::Client::builder()
                .timeout(*timeout)
                .build()
                .map_err(|e| TarotError::DeckSource(e.to_string()))?;

            let request = async {
                let response = client.get(url).send().await?.error_for_status()?;
                Ok::<_, reqwest::Error>(response.bytes().await?)
            };

            // The client timeout covers the transfer; this also bounds DNS and connect
            match tokio::time::timeout(*timeout, request).await {
                Ok(Ok(bytes)) => Ok(bytes.to_vec()),
                Ok(Err(e)) => Err(TarotError::DeckSource(format!("{url}: {e}"))),
                Err(_) => Err(TarotError::DeckSource(format!(
                    "{url}: timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        }
    }
}

/// Read and parse a catalog from a single source
pub async fn load_from(source: &DeckSource) -> Result<Deck, TarotError> {
    let bytes = fetch_source(source).await?;
    let deck = Deck::from_json_slice(&bytes)?;
    if deck.is_empty() {
        return Err(TarotError::InvalidCatalog(format!("{source} has no cards")));
    }
    Ok(deck)
}

/// Load the deck from the primary source, falling back to the secondary one
///
/// Never fails: on total failure an empty deck is returned and every draw
/// from it reports `DeckUnavailable`.
pub async fn load_deck(primary: &DeckSource, fallback: Option<&DeckSource>) -> Deck {
    match load_from(primary).await {
        Ok(deck) => {
            info!("Deck loaded from {primary}: {} cards", deck.len());
            return deck;
        }
        Err(e) => error!("Failed to load deck from {primary}: {e}"),
    }

    match fallback {
        Some(fallback) => match load_from(fallback).await {
            Ok(deck) => {
                info!("Deck loaded from fallback {fallback}: {} cards", deck.len());
                deck
            }
            Err(e) => {
                warn!("Deck unavailable, fallback {fallback} failed too: {e}");
                Deck::empty()
            }
        },
        None => {
            warn!("Deck unavailable: no fallback source configured");
            Deck::empty()
        }
    }
}
