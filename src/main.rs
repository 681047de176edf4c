//! CS2 Match Notifier
//!
//! What it does:
//!   1. One crawler per tracked player polls Leetify every 2 minutes
//!   2. New matches from all crawlers are merged and de-duplicated
//!   3. `match` mode: Discord message per match
//!      `session` mode: matches grouped into sessions, one summary per session
//!      `replay` mode: one message for `replay_game_id`, then exit
//!
//! Run:
//!   cargo run --bin match-notifier

mod config;

use anyhow::{Context, Result};
use config::{AppConfig, Mode};
use discord_notifier::{
    notify_replay, DryRunSink, Enricher, MatchNotifier, NotificationSink, NotifierTimings,
    SessionNotifier, WebhookClient,
};
use dotenv::dotenv;
use leetify_api::{LeetifyClient, MatchSource};
use logger::EventLogger;
use match_crawler::{Crawler, CrawlerError, MatchEvent};
use session_engine::{
    run_match_manager, run_session_manager, Deduplicator, MemorySeenSet, SessionWindow,
};
use std::env;
use std::fs::File;
use std::sync::Arc;
use steam_api::{IdentityResolver, SteamClient};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const LOCK_FILE_NAME: &str = "cs2_match_notifier.lock";
const CRAWLER_SPAWN_STAGGER_SECS: u64 = 20;
const EVENT_CHANNEL_CAPACITY: usize = 1024;
const NOTIFY_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!("=== CS2 Match Notifier ===");

    // Single instance lock
    let lock_file_path = env::temp_dir().join(LOCK_FILE_NAME);
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of match-notifier is already running! Exiting.");
            return Ok(());
        }
    };

    let config = AppConfig::load().context("failed to load configuration")?;
    info!("Mode: {}", config.mode);
    info!("Players: {} configured, {} tracked", config.players.len(), config.tracked_players().count());
    if config.is_dry_run() {
        info!("No discord_hook set: DRY RUN, messages are only logged");
    }

    let logger = Arc::new(match &config.log_dir {
        Some(dir) => {
            info!("Logs: {}", dir.display());
            EventLogger::new(dir)
        }
        None => EventLogger::disabled(),
    });

    let source: Arc<dyn MatchSource> = Arc::new(LeetifyClient::new(&config.leetify_api_url));
    let identities: Arc<dyn IdentityResolver> =
        Arc::new(SteamClient::new(&config.steam_api_url, &config.steam_api_key));
    let sink: Arc<dyn NotificationSink> = if config.is_dry_run() {
        Arc::new(DryRunSink)
    } else {
        Arc::new(WebhookClient::new(&config.discord_hook))
    };
    let enricher = Enricher::new(source.clone(), identities, config.players.clone());

    if config.mode == Mode::Replay {
        let game_id = config.replay_game_id.as_deref().unwrap_or_default();
        info!("Replaying match {}", game_id);
        let delivered = notify_replay(&enricher, sink.as_ref(), &logger, game_id)
            .await
            .with_context(|| format!("failed to fetch match {}", game_id))?;
        if !delivered {
            warn!("Replay of {} was not delivered", game_id);
        }
        return Ok(());
    }

    let (event_tx, event_rx) = mpsc::channel::<MatchEvent>(EVENT_CHANNEL_CAPACITY);
    let timings = NotifierTimings::default();

    let pipeline = match config.mode {
        Mode::Match => {
            let (match_tx, match_rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
            let notifier = MatchNotifier::new(enricher, sink, logger.clone(), timings);
            let manager = tokio::spawn(run_match_manager(
                event_rx,
                Deduplicator::new(MemorySeenSet::new()),
                match_tx,
                logger.clone(),
            ));
            (manager, tokio::spawn(notifier.run(match_rx)))
        }
        _ => {
            let (session_tx, session_rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
            let notifier = SessionNotifier::new(enricher, sink, logger.clone(), timings);
            let manager = tokio::spawn(run_session_manager(
                event_rx,
                Deduplicator::new(MemorySeenSet::new()),
                SessionWindow::default(),
                session_tx,
                logger.clone(),
            ));
            (manager, tokio::spawn(notifier.run(session_rx)))
        }
    };

    // Crawler i waits i * stagger before its baseline fetch.
    let mut crawlers = JoinSet::new();
    for (i, player) in config.tracked_players().enumerate() {
        let crawler = Crawler::new(source.clone(), player.clone(), event_tx.clone(), logger.clone());
        let delay = Duration::from_secs(CRAWLER_SPAWN_STAGGER_SECS * i as u64);
        info!("Starting crawler for {} in {}s", player.label(), delay.as_secs());
        crawlers.spawn(async move {
            sleep(delay).await;
            crawler.run().await
        });
    }
    drop(event_tx);

    let outcome = tokio::select! {
        res = wait_for_crawlers(&mut crawlers) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping crawlers");
            Ok(())
        }
    };

    // Dropping every crawler closes the event channel; the manager flushes
    // the open session and the notifier drains before exiting.
    crawlers.shutdown().await;
    let (manager, notifier) = pipeline;
    if let Err(e) = manager.await {
        error!("Manager task failed: {}", e);
    }
    if let Err(e) = notifier.await {
        error!("Notifier task failed: {}", e);
    }

    outcome
}

/// Returns on the first baseline failure, or once every crawler has stopped.
async fn wait_for_crawlers(crawlers: &mut JoinSet<Result<(), CrawlerError>>) -> Result<()> {
    while let Some(joined) = crawlers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("{}", e);
                return Err(e).context("crawler could not start");
            }
            Err(e) => {
                return Err(e).context("crawler task panicked");
            }
        }
    }
    info!("All crawlers stopped");
    Ok(())
}
