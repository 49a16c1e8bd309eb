use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

use crate::reading::Reading;
use crate::session::{SpreadKind, Topic, UserKey};

/// A card as stored in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCard {
    pub code: String,
    pub is_reversed: bool,
}

/// Represents a stored reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user: UserKey,
    pub spread_kind: SpreadKind,
    pub topic: Topic,
    pub question: String,
    pub cards: Vec<HistoryCard>,
    pub created_at: DateTime<Utc>,
}

impl From<&Reading> for HistoryEntry {
    fn from(reading: &Reading) -> Self {
        Self {
            user: reading.request.user,
            spread_kind: reading.request.spread_kind,
            topic: reading.request.topic,
            question: reading.request.question.clone(),
            cards: reading
                .cards
                .iter()
                .map(|c| HistoryCard {
                    code: c.drawn.card.code.clone(),
                    is_reversed: c.drawn.is_reversed,
                })
                .collect(),
            created_at: reading.created_at,
        }
    }
}

/// Optional store of completed readings; the bot works without one
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;

    /// Latest entries of a user, newest first
    async fn recent(&self, user: UserKey, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// Process-local history, lost on restart
///
/// Keeps at most `capacity` entries per user; older ones are dropped.
pub struct InMemoryHistory {
    capacity: usize,
    entries: Mutex<HashMap<UserKey, VecDeque<HistoryEntry>>>,
}

impl InMemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        let mut entries = self.entries.lock().await;
        let user_entries = entries.entry(entry.user).or_default();
        if user_entries.len() == self.capacity {
            user_entries.pop_front();
        }
        user_entries.push_back(entry.clone());
        Ok(())
    }

    async fn recent(&self, user: UserKey, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&user)
            .map(|user_entries| user_entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// PostgreSQL-backed history
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to history database")?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing history schema...");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tarot_readings (
                id BIGSERIAL PRIMARY KEY,
                telegram_id BIGINT NOT NULL,
                spread TEXT NOT NULL,
                topic TEXT NOT NULL,
                question TEXT NOT NULL,
                cards TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create tarot_readings table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS tarot_readings_user_idx
             ON tarot_readings (telegram_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create tarot_readings index")?;

        info!("History schema initialized successfully");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        let cards = serde_json::to_string(&entry.cards)?;

        sqlx::query(
            "INSERT INTO tarot_readings (telegram_id, spread, topic, question, cards, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user.0)
        .bind(entry.spread_kind.key())
        .bind(entry.topic.key())
        .bind(&entry.question)
        .bind(cards)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert reading")?;

        info!("Reading stored for telegram_id: {}", entry.user);
        Ok(())
    }

    async fn recent(&self, user: UserKey, limit: usize) -> Result<Vec<HistoryEntry>> {
        let rows: Vec<(String, String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT spread, topic, question, cards, created_at
             FROM tarot_readings
             WHERE telegram_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read reading history")?;

        rows.into_iter()
            .map(|(spread, topic, question, cards, created_at)| {
                Ok(HistoryEntry {
                    user,
                    spread_kind: SpreadKind::from_key(&spread)
                        .with_context(|| format!("Unknown spread in history: {spread}"))?,
                    topic: Topic::from_key(&topic)
                        .with_context(|| format!("Unknown topic in history: {topic}"))?,
                    question,
                    cards: serde_json::from_str(&cards)
                        .context("Malformed cards column in history")?,
                    created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(user: i64, question: &str, minute: u32) -> HistoryEntry {
        HistoryEntry {
            user: UserKey(user),
            spread_kind: SpreadKind::One,
            topic: Topic::Work,
            question: question.to_string(),
            cards: vec![HistoryCard {
                code: "major_00".to_string(),
                is_reversed: false,
            }],
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_recent_newest_first() -> Result<()> {
        let history = InMemoryHistory::new(5);
        history.record(&entry(1, "first", 0)).await?;
        history.record(&entry(2, "other user", 1)).await?;
        history.record(&entry(1, "second", 2)).await?;
        history.record(&entry(1, "third", 3)).await?;

        let recent = history.recent(UserKey(1), 2).await?;
        let questions: Vec<_> = recent.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["third", "second"]);

        assert!(history.recent(UserKey(3), 5).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_in_memory_keeps_only_newest_entries_per_user() -> Result<()> {
        let history = InMemoryHistory::new(3);
        for minute in 0..10 {
            history.record(&entry(1, &format!("q{minute}"), minute)).await?;
        }
        history.record(&entry(2, "other user", 30)).await?;

        let recent = history.recent(UserKey(1), 10).await?;
        let questions: Vec<_> = recent.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q9", "q8", "q7"]);

        assert_eq!(history.recent(UserKey(2), 10).await?.len(), 1);
        assert_eq!(history.entries.lock().await.values().map(VecDeque::len).sum::<usize>(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_in_memory_zero_capacity_stores_nothing() -> Result<()> {
        let history = InMemoryHistory::new(0);
        history.record(&entry(1, "ignored", 0)).await?;
        assert!(history.recent(UserKey(1), 5).await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_history_cards_serialization() {
        let cards = vec![HistoryCard {
            code: "cups_02".to_string(),
            is_reversed: true,
        }];
        let json = serde_json::to_string(&cards).unwrap();
        let parsed: Vec<HistoryCard> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cards);
    }
}
