//! Session module: per-user conversation state and the store that holds it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Stable identifier of a user across updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserKey(pub i64);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Size of the requested spread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadKind {
    One,
    Three,
}

impl SpreadKind {
    pub const ALL: [SpreadKind; 2] = [SpreadKind::One, SpreadKind::Three];

    pub fn card_count(self) -> usize {
        self.positions().len()
    }

    /// Localization keys of the positions, in draw order
    pub fn positions(self) -> &'static [&'static str] {
        match self {
            SpreadKind::One => &["position-advice"],
            SpreadKind::Three => &["position-past", "position-present", "position-future"],
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            SpreadKind::One => "one",
            SpreadKind::Three => "three",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        SpreadKind::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// Life-domain category of a request, declared in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Relationships,
    Work,
    Money,
}

lazy_static! {
    static ref TOPIC_PATTERNS: Vec<(Topic, Regex)> = vec![
        (
            Topic::Relationships,
            Regex::new(r"(?i)\b(отношен|любов|relationship|love)|❤").unwrap()
        ),
        (
            Topic::Work,
            Regex::new(r"(?i)\b(работ|карьер|work|career|job)|💼").unwrap()
        ),
        (
            Topic::Money,
            Regex::new(r"(?i)\b(ден|финанс|money|financ)|💰").unwrap()
        ),
    ];
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Relationships, Topic::Work, Topic::Money];

    pub fn key(self) -> &'static str {
        match self {
            Topic::Relationships => "relationships",
            Topic::Work => "work",
            Topic::Money => "money",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Topic::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Match free text such as a keyboard label or a typed word against the topics
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(topic) = Topic::from_key(&text.to_lowercase()) {
            return Some(topic);
        }
        TOPIC_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(topic, _)| *topic)
    }
}

/// Where a user is within the reading form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingTopic {
        spread: SpreadKind,
    },
    AwaitingQuestion {
        spread: SpreadKind,
        topic: Topic,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::AwaitingTopic { .. } => "AwaitingTopic",
            SessionState::AwaitingQuestion { .. } => "AwaitingQuestion",
        }
    }
}

/// Conversation state of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: SessionState,
}

impl Session {
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }
}

/// Shared handle to one user's session; holding the lock serializes that user's updates
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Mapping from user to session, injected into the state machine
pub trait SessionStore: Send + Sync {
    /// Get the session handle of a user, creating an idle session on first use
    fn session(&self, user: UserKey) -> SessionHandle;
}

/// Thread-safe in-memory session store
///
/// Each user owns an independent `tokio::sync::Mutex`, so users never wait
/// on each other beyond the short registry lookup.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<UserKey, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a session
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn session(&self, user: UserKey) -> SessionHandle {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(sessions.entry(user).or_default())
    }
}
