//! Conversation flows through the session state machine

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use tarot_bot::cooldown::CooldownTracker;
use tarot_bot::session::{
    InMemorySessionStore, Session, SessionHandle, SessionState, SessionStore, SpreadKind, Topic,
    UserKey,
};
use tarot_bot::state_machine::{
    CompletedRequest, Prompt, TarotStateMachine, Transition, UserInput,
};

const ALICE: UserKey = UserKey(1001);
const BOB: UserKey = UserKey(2002);

fn machine(window_secs: u64, exempt: &[UserKey]) -> TarotStateMachine<InMemorySessionStore> {
    TarotStateMachine::new(
        Arc::new(InMemorySessionStore::new()),
        CooldownTracker::new(
            Duration::from_secs(window_secs),
            exempt.iter().copied().collect::<HashSet<_>>(),
        ),
        SpreadKind::ALL.to_vec(),
    )
}

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

async fn complete<S: SessionStore>(
    machine: &TarotStateMachine<S>,
    user: UserKey,
    spread: SpreadKind,
    now: chrono::DateTime<Utc>,
) -> Transition {
    machine
        .handle_input(user, UserInput::ChooseSpread(spread), now)
        .await;
    machine
        .handle_input(user, UserInput::ChooseTopic(Topic::Work), now)
        .await;
    machine
        .handle_input(user, UserInput::Text("What next?".to_string()), now)
        .await
}

#[tokio::test]
async fn test_money_question_completes_three_card_request() {
    let machine = machine(60, &[]);

    let outcome = machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::Three), at(0))
        .await;
    assert_eq!(
        outcome,
        Transition::Prompt(Prompt::ChooseTopic {
            spread: SpreadKind::Three
        })
    );

    let outcome = machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Money), at(1))
        .await;
    assert_eq!(
        outcome,
        Transition::Prompt(Prompt::AskQuestion {
            spread: SpreadKind::Three,
            topic: Topic::Money
        })
    );

    let outcome = machine
        .handle_input(
            ALICE,
            UserInput::Text("will I get the raise?".to_string()),
            at(2),
        )
        .await;
    assert_eq!(
        outcome.completed(),
        Some(CompletedRequest {
            user: ALICE,
            spread_kind: SpreadKind::Three,
            topic: Topic::Money,
            question: "will I get the raise?".to_string(),
        })
    );
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);
}

#[tokio::test]
async fn test_typed_topic_is_accepted() {
    let machine = machine(0, &[]);

    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(0))
        .await;
    let outcome = machine
        .handle_input(ALICE, UserInput::Text("деньги".to_string()), at(0))
        .await;

    assert_eq!(
        outcome,
        Transition::Prompt(Prompt::AskQuestion {
            spread: SpreadKind::One,
            topic: Topic::Money
        })
    );
}

#[tokio::test]
async fn test_cancel_from_any_state_returns_to_idle() {
    let machine = machine(60, &[]);

    // From idle
    let outcome = machine.handle_input(ALICE, UserInput::Cancel, at(0)).await;
    assert_eq!(outcome, Transition::Cancelled);
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);

    // From topic selection
    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(0))
        .await;
    machine.handle_input(ALICE, UserInput::Cancel, at(0)).await;
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);

    // From question entry
    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(0))
        .await;
    machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Work), at(0))
        .await;
    machine.handle_input(ALICE, UserInput::Cancel, at(0)).await;
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);

    // Cancelling never starts a cooldown
    assert_eq!(machine.cooldown_remaining(ALICE, at(0)), Duration::ZERO);
}

#[tokio::test]
async fn test_flow_after_cancel_ignores_discarded_form() {
    let machine = machine(60, &[]);

    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::Three), at(0))
        .await;
    machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Work), at(0))
        .await;
    machine.handle_input(ALICE, UserInput::Cancel, at(0)).await;

    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(1))
        .await;
    machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Money), at(1))
        .await;
    let outcome = machine
        .handle_input(
            ALICE,
            UserInput::Text("will I get the raise?".to_string()),
            at(2),
        )
        .await;

    assert_eq!(
        outcome.completed(),
        Some(CompletedRequest {
            user: ALICE,
            spread_kind: SpreadKind::One,
            topic: Topic::Money,
            question: "will I get the raise?".to_string(),
        })
    );
}

#[tokio::test]
async fn test_invalid_input_keeps_state() -> Result<()> {
    let machine = machine(60, &[]);

    let outcome = machine
        .handle_input(ALICE, UserInput::Text("hello".to_string()), at(0))
        .await;
    assert_eq!(outcome, Transition::Invalid(Prompt::ChooseSpread));

    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::Three), at(0))
        .await;
    let outcome = machine
        .handle_input(ALICE, UserInput::Text("weather".to_string()), at(0))
        .await;
    assert_eq!(
        outcome,
        Transition::Invalid(Prompt::ChooseTopic {
            spread: SpreadKind::Three
        })
    );

    machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Work), at(0))
        .await;
    let outcome = machine
        .handle_input(ALICE, UserInput::Text("   ".to_string()), at(0))
        .await;
    assert!(matches!(outcome, Transition::Invalid(_)));
    assert_eq!(
        machine.state_of(ALICE).await,
        SessionState::AwaitingQuestion {
            spread: SpreadKind::Three,
            topic: Topic::Work
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_second_reading_within_window_is_rejected() {
    let machine = machine(60, &[]);

    assert!(complete(&machine, ALICE, SpreadKind::One, at(0))
        .await
        .completed()
        .is_some());

    let outcome = machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(1))
        .await;
    assert_eq!(
        outcome,
        Transition::CoolingDown {
            remaining: Duration::from_secs(59)
        }
    );
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);

    // Window elapsed
    assert!(complete(&machine, ALICE, SpreadKind::One, at(60))
        .await
        .completed()
        .is_some());
}

#[tokio::test]
async fn test_cooldown_is_per_user() {
    let machine = machine(60, &[]);

    // Bob starts his form before Alice completes hers
    machine
        .handle_input(BOB, UserInput::ChooseSpread(SpreadKind::One), at(0))
        .await;
    machine
        .handle_input(BOB, UserInput::ChooseTopic(Topic::Relationships), at(0))
        .await;

    assert!(complete(&machine, ALICE, SpreadKind::One, at(0))
        .await
        .completed()
        .is_some());

    // Alice restarts right away: rejected at the spread gate
    let outcome = machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(10))
        .await;
    assert!(matches!(outcome, Transition::CoolingDown { .. }));

    // Bob is unaffected by Alice's cooldown
    let outcome = machine
        .handle_input(BOB, UserInput::Text("Is it love?".to_string()), at(10))
        .await;
    assert!(outcome.completed().is_some());
}

#[tokio::test]
async fn test_exempt_user_is_never_limited() {
    let machine = machine(3600, &[ALICE]);

    for i in 0..3 {
        let outcome = complete(&machine, ALICE, SpreadKind::Three, at(i)).await;
        assert!(outcome.completed().is_some());
    }
}

#[tokio::test]
async fn test_choosing_spread_mid_flow_restarts_form() {
    let machine = machine(0, &[]);

    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::One), at(0))
        .await;
    machine
        .handle_input(ALICE, UserInput::ChooseTopic(Topic::Work), at(0))
        .await;
    machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::Three), at(0))
        .await;

    assert_eq!(
        machine.state_of(ALICE).await,
        SessionState::AwaitingTopic {
            spread: SpreadKind::Three
        }
    );
}

#[tokio::test]
async fn test_unavailable_spread_is_rejected() {
    let machine = TarotStateMachine::new(
        Arc::new(InMemorySessionStore::new()),
        CooldownTracker::new(Duration::ZERO, HashSet::new()),
        vec![SpreadKind::One],
    );

    let outcome = machine
        .handle_input(ALICE, UserInput::ChooseSpread(SpreadKind::Three), at(0))
        .await;
    assert_eq!(outcome, Transition::SpreadUnavailable(SpreadKind::Three));
    assert_eq!(machine.state_of(ALICE).await, SessionState::Idle);
}

#[tokio::test]
async fn test_concurrent_users_do_not_interfere() {
    let store = Arc::new(InMemorySessionStore::new());
    let machine = Arc::new(TarotStateMachine::new(
        Arc::clone(&store),
        CooldownTracker::new(Duration::from_secs(60), HashSet::new()),
        SpreadKind::ALL.to_vec(),
    ));

    let mut tasks = Vec::new();
    for id in 0..32 {
        let machine = Arc::clone(&machine);
        tasks.push(tokio::spawn(async move {
            complete(&machine, UserKey(id), SpreadKind::Three, at(0)).await
        }));
    }

    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(outcome.completed().is_some());
    }
    assert_eq!(store.len(), 32);
}

/// Store that records which users were looked up
#[derive(Default)]
struct RecordingStore {
    sessions: Mutex<HashMap<UserKey, SessionHandle>>,
    lookups: Mutex<Vec<UserKey>>,
}

impl SessionStore for RecordingStore {
    fn session(&self, user: UserKey) -> SessionHandle {
        self.lookups.lock().unwrap().push(user);
        let mut sessions = self.sessions.lock().unwrap();
        Arc::clone(
            sessions
                .entry(user)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Session::default()))),
        )
    }
}

#[tokio::test]
async fn test_machine_works_with_custom_store() {
    let store = Arc::new(RecordingStore::default());
    let machine = TarotStateMachine::new(
        Arc::clone(&store),
        CooldownTracker::new(Duration::ZERO, HashSet::new()),
        SpreadKind::ALL.to_vec(),
    );

    let outcome = complete(&machine, BOB, SpreadKind::One, at(0)).await;
    assert!(outcome.completed().is_some());
    assert_eq!(store.lookups.lock().unwrap().as_slice(), &[BOB, BOB, BOB]);
}
