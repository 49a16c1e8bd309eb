//! Reading form state machine
//!
//! Collects spread size → topic → question per user. [`transition`] is a pure
//! function of the current state and one input; [`TarotStateMachine`] wraps it
//! with the session store, the per-user lock and the cooldown gate.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cooldown::CooldownTracker;
use crate::deck::Deck;
use crate::errors::TarotError;
use crate::session::{SessionState, SessionStore, SpreadKind, Topic, UserKey};

/// Typed input resolved by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    ChooseSpread(SpreadKind),
    ChooseTopic(Topic),
    Text(String),
    Cancel,
}

impl UserInput {
    fn name(&self) -> String {
        match self {
            UserInput::ChooseSpread(spread) => format!("ChooseSpread({})", spread.key()),
            UserInput::ChooseTopic(topic) => format!("ChooseTopic({})", topic.key()),
            UserInput::Text(_) => "Text".to_string(),
            UserInput::Cancel => "Cancel".to_string(),
        }
    }
}

/// What the user should be asked next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    ChooseSpread,
    ChooseTopic { spread: SpreadKind },
    AskQuestion { spread: SpreadKind, topic: Topic },
}

impl Prompt {
    fn for_state(state: &SessionState) -> Self {
        match state {
            SessionState::Idle => Prompt::ChooseSpread,
            SessionState::AwaitingTopic { spread } => Prompt::ChooseTopic { spread: *spread },
            SessionState::AwaitingQuestion { spread, topic } => Prompt::AskQuestion {
                spread: *spread,
                topic: *topic,
            },
        }
    }
}

/// A fully assembled reading request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRequest {
    pub user: UserKey,
    pub spread_kind: SpreadKind,
    pub topic: Topic,
    pub question: String,
}

/// Result of feeding one input to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Step accepted; ask for the next field
    Prompt(Prompt),
    /// Input not valid in the current state; state unchanged, ask again
    Invalid(Prompt),
    /// The form is complete; the session is back to idle
    Completed(CompletedRequest),
    /// Cooldown still running; state unchanged
    CoolingDown { remaining: Duration },
    /// The deck cannot serve this spread
    SpreadUnavailable(SpreadKind),
    /// The session was discarded
    Cancelled,
}

impl Transition {
    pub fn completed(self) -> Option<CompletedRequest> {
        match self {
            Transition::Completed(request) => Some(request),
            _ => None,
        }
    }
}

/// Facts about the outside world the pure transition depends on
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub user: UserKey,
    pub cooldown_remaining: Duration,
    pub available_spreads: &'a [SpreadKind],
}

/// Pure state transition
///
/// Returns the next state and the outcome to report. On any rejection the
/// returned state equals the input state.
pub fn transition(
    state: &SessionState,
    input: UserInput,
    ctx: TransitionContext<'_>,
) -> (SessionState, Transition) {
    match (state, input) {
        (_, UserInput::Cancel) => (SessionState::Idle, Transition::Cancelled),

        (_, UserInput::ChooseSpread(spread)) => {
            if !ctx.available_spreads.contains(&spread) {
                (state.clone(), Transition::SpreadUnavailable(spread))
            } else if !ctx.cooldown_remaining.is_zero() {
                (
                    state.clone(),
                    Transition::CoolingDown {
                        remaining: ctx.cooldown_remaining,
                    },
                )
            } else {
                (
                    SessionState::AwaitingTopic { spread },
                    Transition::Prompt(Prompt::ChooseTopic { spread }),
                )
            }
        }

        (SessionState::AwaitingTopic { spread }, UserInput::ChooseTopic(topic)) => {
            accept_topic(*spread, topic)
        }
        (SessionState::AwaitingTopic { spread }, UserInput::Text(text)) => {
            match Topic::from_text(&text) {
                Some(topic) => accept_topic(*spread, topic),
                None => (state.clone(), Transition::Invalid(Prompt::for_state(state))),
            }
        }

        (SessionState::AwaitingQuestion { spread, topic }, UserInput::Text(text)) => {
            let question = text.trim();
            if question.is_empty() {
                (state.clone(), Transition::Invalid(Prompt::for_state(state)))
            } else if !ctx.cooldown_remaining.is_zero() {
                (
                    state.clone(),
                    Transition::CoolingDown {
                        remaining: ctx.cooldown_remaining,
                    },
                )
            } else {
                (
                    SessionState::Idle,
                    Transition::Completed(CompletedRequest {
                        user: ctx.user,
                        spread_kind: *spread,
                        topic: *topic,
                        question: question.to_string(),
                    }),
                )
            }
        }

        (_, _) => (state.clone(), Transition::Invalid(Prompt::for_state(state))),
    }
}

fn accept_topic(spread: SpreadKind, topic: Topic) -> (SessionState, Transition) {
    (
        SessionState::AwaitingQuestion { spread, topic },
        Transition::Prompt(Prompt::AskQuestion { spread, topic }),
    )
}

/// Spreads the deck has enough cards for; the rest are reported as errors
pub fn validate_spreads(deck: &Deck) -> (Vec<SpreadKind>, Vec<TarotError>) {
    let mut available = Vec::new();
    let mut errors = Vec::new();

    for spread in SpreadKind::ALL {
        if deck.is_empty() {
            errors.push(TarotError::DeckUnavailable);
            break;
        }
        if spread.card_count() > deck.len() {
            errors.push(TarotError::InsufficientCards {
                requested: spread.card_count(),
                available: deck.len(),
            });
        } else {
            available.push(spread);
        }
    }

    (available, errors)
}

/// Session state machine bound to a store and a cooldown tracker
pub struct TarotStateMachine<S: SessionStore> {
    store: Arc<S>,
    cooldown: CooldownTracker,
    available_spreads: Vec<SpreadKind>,
}

impl<S: SessionStore> TarotStateMachine<S> {
    pub fn new(store: Arc<S>, cooldown: CooldownTracker, available_spreads: Vec<SpreadKind>) -> Self {
        Self {
            store,
            cooldown,
            available_spreads,
        }
    }

    pub fn available_spreads(&self) -> &[SpreadKind] {
        &self.available_spreads
    }

    /// Feed one input for `user`
    ///
    /// Holds the user's session lock for the whole transition so that two
    /// updates from the same user cannot interleave.
    pub async fn handle_input(
        &self,
        user: UserKey,
        input: UserInput,
        now: DateTime<Utc>,
    ) -> Transition {
        let handle = self.store.session(user);
        let mut session = handle.lock().await;

        let input_name = input.name();
        let ctx = TransitionContext {
            user,
            cooldown_remaining: self.cooldown.remaining(user, now),
            available_spreads: &self.available_spreads,
        };
        let (next, outcome) = transition(&session.state, input, ctx);

        match &outcome {
            Transition::Invalid(_) => {
                let err = TarotError::InvalidTransitionInput {
                    state: session.state.name().to_string(),
                    input: input_name,
                };
                debug!(user_id = %user, error = %err, "Re-prompting after invalid input");
            }
            Transition::Completed(_) => {
                self.cooldown.record_completion(user, now);
                info!(user_id = %user, "Reading request completed");
            }
            Transition::CoolingDown { remaining } => {
                debug!(user_id = %user, remaining_secs = remaining.as_secs(), "Rejected during cooldown");
            }
            _ => {
                debug!(user_id = %user, from = session.state.name(), to = next.name(), "Session transition");
            }
        }

        session.state = next;
        outcome
    }

    /// Unconditionally reset a user's session to idle
    pub async fn cancel(&self, user: UserKey) {
        let handle = self.store.session(user);
        handle.lock().await.reset();
        debug!(user_id = %user, "Session cancelled");
    }

    /// Current state of a user's session
    pub async fn state_of(&self, user: UserKey) -> SessionState {
        self.store.session(user).lock().await.state.clone()
    }

    pub fn cooldown_remaining(&self, user: UserKey, now: DateTime<Utc>) -> Duration {
        self.cooldown.remaining(user, now)
    }
}
