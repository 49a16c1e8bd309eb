//! # Cooldown Module
//!
//! Enforces a minimum interval between a user's completed readings.
//! The tracker only stores the timestamp of each user's last completion;
//! remaining time is always computed against a caller-supplied `now`.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::CooldownConfig;
use crate::session::UserKey;

/// Per-user cooldown tracker
///
/// # Behavior
///
/// - Users without a completed reading are never cooling down
/// - Exempt users are never cooling down
/// - The remaining time is `window - (now - last)`, clamped to zero
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    exempt: HashSet<UserKey>,
    last_completed: Mutex<HashMap<UserKey, DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new(window: Duration, exempt: HashSet<UserKey>) -> Self {
        Self {
            window,
            exempt,
            last_completed: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CooldownConfig) -> Self {
        Self::new(
            Duration::from_secs(config.window_secs),
            config.exempt_users.clone(),
        )
    }

    pub fn is_exempt(&self, user: UserKey) -> bool {
        self.exempt.contains(&user)
    }

    /// Time left before `user` may complete another reading
    pub fn remaining(&self, user: UserKey, now: DateTime<Utc>) -> Duration {
        if self.is_exempt(user) {
            return Duration::ZERO;
        }

        let last = {
            let last_completed = self
                .last_completed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match last_completed.get(&user) {
                Some(last) => *last,
                None => return Duration::ZERO,
            }
        };

        // A clock that went backwards counts as no time elapsed
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.window.saturating_sub(elapsed)
    }

    /// Record a completed reading at `at`
    pub fn record_completion(&self, user: UserKey, at: DateTime<Utc>) {
        if self.is_exempt(user) {
            return;
        }
        self.last_completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user, at);
    }
}
