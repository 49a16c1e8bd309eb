use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tarot_bot::bot::{callback_handler, message_handler, BotState};
use tarot_bot::config::BotConfig;
use tarot_bot::cooldown::CooldownTracker;
use tarot_bot::deck_loader::load_deck;
use tarot_bot::history::{HistoryStore, InMemoryHistory, PgHistoryStore};
use tarot_bot::localization::init_localization;
use tarot_bot::reading::TarotReader;
use tarot_bot::session::InMemorySessionStore;
use tarot_bot::state_machine::{validate_spreads, TarotStateMachine};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    init_logging();

    info!("Starting Tarot Telegram Bot");

    let config = BotConfig::from_env()?;
    init_localization()?;

    let deck = load_deck(
        &config.deck.primary_source(),
        config.deck.fallback_source().as_ref(),
    )
    .await;

    let (available_spreads, spread_errors) = validate_spreads(&deck);
    for e in &spread_errors {
        warn!(error = %e, "Spread disabled at startup");
    }
    info!(cards = deck.len(), spreads = ?available_spreads, "Deck ready");

    let history: Arc<dyn HistoryStore> = match &config.database_url {
        Some(url) => match PgHistoryStore::connect(url).await {
            Ok(store) => {
                info!("Reading history stored in PostgreSQL");
                Arc::new(store)
            }
            Err(e) => {
                warn!(error = %e, "History database unavailable, keeping history in memory");
                Arc::new(InMemoryHistory::new(config.history_limit))
            }
        },
        None => Arc::new(InMemoryHistory::new(config.history_limit)),
    };

    let machine = TarotStateMachine::new(
        Arc::new(InMemorySessionStore::new()),
        CooldownTracker::from_config(&config.cooldown),
        available_spreads,
    );

    let state = Arc::new(BotState {
        machine,
        reader: TarotReader::new(Arc::new(deck)),
        history,
        history_limit: config.history_limit,
    });

    // Initialize the bot
    let bot = Bot::new(config.bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
