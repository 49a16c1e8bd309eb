//! Delivery of a reading to a chat.
//!
//! Photos are sent only for `https://` images. Any photo failure degrades to
//! a text message carrying the same caption plus a link; only a failing text
//! send is reported to the caller.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, ParseMode};
use teloxide::utils::html;
use tracing::{debug, warn};

use crate::deck::Deck;
use crate::errors::TarotError;
use crate::localization::t_lang;
use crate::reading::{PositionedCard, Reading};

use super::ui_builder::{format_card_caption, MAX_CAPTION_CHARS};

/// Outbound operations of the messaging gateway for one chat
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send an HTML text message
    async fn send_text(&self, text: &str) -> Result<(), TarotError>;

    /// Send one photo with an HTML caption
    async fn send_photo(&self, url: &str, caption: &str) -> Result<(), TarotError>;

    /// Send several photos as one album; each item is `(url, caption)`
    async fn send_photo_set(&self, photos: &[(String, String)]) -> Result<(), TarotError>;
}

/// `MessageSink` backed by the Telegram Bot API
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

fn parse_url(url: &str) -> Result<reqwest::Url, TarotError> {
    reqwest::Url::parse(url).map_err(|e| TarotError::DeliveryFailure(format!("{url}: {e}")))
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send_text(&self, text: &str) -> Result<(), TarotError> {
        self.bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| TarotError::DeliveryFailure(e.to_string()))
    }

    async fn send_photo(&self, url: &str, caption: &str) -> Result<(), TarotError> {
        let url = parse_url(url)?;
        self.bot
            .send_photo(self.chat_id, InputFile::url(url))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| TarotError::DeliveryFailure(e.to_string()))
    }

    async fn send_photo_set(&self, photos: &[(String, String)]) -> Result<(), TarotError> {
        let media = photos
            .iter()
            .map(|(url, caption)| {
                Ok(InputMedia::Photo(
                    InputMediaPhoto::new(InputFile::url(parse_url(url)?))
                        .caption(caption.clone())
                        .parse_mode(ParseMode::Html),
                ))
            })
            .collect::<Result<Vec<_>, TarotError>>()?;

        self.bot
            .send_media_group(self.chat_id, media)
            .await
            .map(|_| ())
            .map_err(|e| TarotError::DeliveryFailure(e.to_string()))
    }
}

/// What actually went out for a reading
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub photos_sent: usize,
    pub text_fallbacks: usize,
}

fn photo_url(deck: &Deck, card: &PositionedCard) -> Option<String> {
    deck.image_url(&card.drawn.card)
}

fn is_photo_url(url: &str) -> bool {
    url.starts_with("https://")
}

/// Send one card as a photo, or as text with a link when that is not possible
pub async fn send_card<S: MessageSink + ?Sized>(
    sink: &S,
    deck: &Deck,
    card: &PositionedCard,
    lang: &str,
    report: &mut DeliveryReport,
) -> Result<(), TarotError> {
    let caption = format_card_caption(card, lang, MAX_CAPTION_CHARS);
    let url = photo_url(deck, card);

    if let Some(url) = url.as_deref().filter(|u| is_photo_url(u)) {
        match sink.send_photo(url, &caption).await {
            Ok(()) => {
                report.photos_sent += 1;
                return Ok(());
            }
            Err(e) => warn!(url = %url, error = %e, "Failed to send card photo, falling back to text"),
        }
    }

    let mut text = format_card_caption(card, lang, usize::MAX);
    if let Some(url) = url {
        text.push_str(&format!(
            "\n\n<a href=\"{}\">{}</a>",
            html::escape(&url),
            html::escape(&t_lang("card-image-link", Some(lang)))
        ));
    }
    sink.send_text(&text).await?;
    report.text_fallbacks += 1;
    Ok(())
}

/// Deliver all cards of a reading followed by its summary
pub async fn deliver_reading<S: MessageSink + ?Sized>(
    sink: &S,
    deck: &Deck,
    reading: &Reading,
    lang: &str,
) -> Result<DeliveryReport, TarotError> {
    let mut report = DeliveryReport::default();

    let album: Option<Vec<(String, String)>> = if reading.cards.len() > 1 {
        reading
            .cards
            .iter()
            .map(|card| {
                photo_url(deck, card)
                    .filter(|u| is_photo_url(u))
                    .map(|url| (url, format_card_caption(card, lang, MAX_CAPTION_CHARS)))
            })
            .collect()
    } else {
        None
    };

    let album_sent = match album {
        Some(photos) => match sink.send_photo_set(&photos).await {
            Ok(()) => {
                report.photos_sent += photos.len();
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send card album, sending cards one by one");
                false
            }
        },
        None => false,
    };

    if !album_sent {
        for card in &reading.cards {
            send_card(sink, deck, card, lang, &mut report).await?;
        }
    }

    sink.send_text(&html::escape(&reading.summary)).await?;
    debug!(
        photos = report.photos_sent,
        text_fallbacks = report.text_fallbacks,
        "Reading delivered"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Card;
    use crate::draw::DrawnCard;
    use crate::session::{SpreadKind, Topic, UserKey};
    use crate::state_machine::CompletedRequest;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Photo(String),
        Album(usize),
    }

    #[derive(Default)]
    struct FakeSink {
        fail_photos: bool,
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl MessageSink for FakeSink {
        async fn send_text(&self, text: &str) -> Result<(), TarotError> {
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
            Ok(())
        }

        async fn send_photo(&self, url: &str, _caption: &str) -> Result<(), TarotError> {
            if self.fail_photos {
                return Err(TarotError::DeliveryFailure("unsupported url".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Photo(url.to_string()));
            Ok(())
        }

        async fn send_photo_set(&self, photos: &[(String, String)]) -> Result<(), TarotError> {
            if self.fail_photos {
                return Err(TarotError::DeliveryFailure("album rejected".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Album(photos.len()));
            Ok(())
        }
    }

    fn reading(deck: &Deck, spread: SpreadKind) -> Reading {
        let positions = spread.positions();
        let cards = deck
            .cards()
            .iter()
            .zip(positions)
            .map(|(card, &position)| PositionedCard {
                position,
                drawn: DrawnCard::new(Arc::clone(card), false),
            })
            .collect();

        Reading {
            request: CompletedRequest {
                user: UserKey(1),
                spread_kind: spread,
                topic: Topic::Money,
                question: "raise?".to_string(),
            },
            cards,
            summary: "summary <text>".to_string(),
            created_at: Utc::now(),
        }
    }

    fn deck(base: &str) -> Deck {
        let cards = (0..3)
            .map(|i| Card {
                code: format!("cups_{i:02}"),
                title: format!("Cups {i}"),
                title_ru: None,
                upright_text: "Joy & friendship".to_string(),
                reversed_text: String::new(),
                image_ref: format!("cups_{i:02}.jpg"),
            })
            .collect();
        Deck::new("test", cards, 0, base).unwrap()
    }

    #[tokio::test]
    async fn test_single_https_card_sent_as_photo() {
        let deck = deck("https://img.example.org");
        let sink = FakeSink::default();
        let report = deliver_reading(&sink, &deck, &reading(&deck, SpreadKind::One), "en")
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { photos_sent: 1, text_fallbacks: 0 });
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], Sent::Photo("https://img.example.org/cups_00.jpg".to_string()));
        assert_eq!(sent[1], Sent::Text("summary &lt;text&gt;".to_string()));
    }

    #[tokio::test]
    async fn test_three_cards_sent_as_album() {
        let deck = deck("https://img.example.org/");
        let sink = FakeSink::default();
        let report = deliver_reading(&sink, &deck, &reading(&deck, SpreadKind::Three), "en")
            .await
            .unwrap();

        assert_eq!(report.photos_sent, 3);
        assert_eq!(sink.sent.lock().unwrap()[0], Sent::Album(3));
    }

    #[tokio::test]
    async fn test_photo_failure_degrades_to_text_with_link() {
        let deck = deck("https://img.example.org");
        let sink = FakeSink {
            fail_photos: true,
            ..Default::default()
        };
        let report = deliver_reading(&sink, &deck, &reading(&deck, SpreadKind::Three), "en")
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { photos_sent: 0, text_fallbacks: 3 });
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        match &sent[0] {
            Sent::Text(text) => {
                assert!(text.contains("https://img.example.org/cups_00.jpg"));
                assert!(text.contains("Joy &amp; friendship"));
            }
            other => panic!("Expected text fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_http_images_are_linked_not_sent() {
        let deck = deck("http://img.example.org");
        let sink = FakeSink::default();
        let report = deliver_reading(&sink, &deck, &reading(&deck, SpreadKind::One), "en")
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport { photos_sent: 0, text_fallbacks: 1 });
        let sent = sink.sent.lock().unwrap();
        match &sent[0] {
            Sent::Text(text) => assert!(text.contains("http://img.example.org/cups_00.jpg")),
            other => panic!("Expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_images_configured() {
        let deck = deck("");
        let sink = FakeSink::default();
        let report = deliver_reading(&sink, &deck, &reading(&deck, SpreadKind::Three), "en")
            .await
            .unwrap();

        assert_eq!(report.text_fallbacks, 3);
        let sent = sink.sent.lock().unwrap();
        for message in sent.iter() {
            if let Sent::Text(text) = message {
                assert!(!text.contains("href"));
            }
        }
    }
}
