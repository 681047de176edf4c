use chrono::Utc;
use logger::{EventLogger, MatchAcceptedEvent, SessionFlushedEvent, now_iso};
use match_crawler::MatchEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::seen::{Deduplicator, SeenSet};
use crate::window::{FlushReason, PushOutcome, Session, SessionWindow};

/// Match mode: every first sighting of a game id goes straight to the notifier.
/// Returns when all crawlers are gone or the notifier stopped listening.
pub async fn run_match_manager<S: SeenSet>(
    mut rx:     mpsc::Receiver<MatchEvent>,
    mut dedup:  Deduplicator<S>,
    out:        mpsc::Sender<MatchEvent>,
    logger:     Arc<EventLogger>,
) {
    info!("Manager: Started manager, waiting for matches...");

    while let Some(event) = rx.recv().await {
        let Some(event) = dedup.admit(event) else {
            continue;
        };
        log_accepted(&logger, &event);
        info!("Manager: New match detected: {}", event.summary.game_id);

        if out.send(event).await.is_err() {
            warn!("Manager: notifier channel closed, stopping");
            return;
        }
    }

    info!("Manager: all crawlers stopped");
}

/// Session mode: deduplicated matches feed the session window; closed sessions
/// go to the notifier. Incoming matches and the inactivity tick are handled
/// one at a time by this task, which is the only owner of the window.
pub async fn run_session_manager<S: SeenSet>(
    mut rx:     mpsc::Receiver<MatchEvent>,
    mut dedup:  Deduplicator<S>,
    mut window: SessionWindow,
    out:        mpsc::Sender<Session>,
    logger:     Arc<EventLogger>,
) {
    let mut ticker = tokio::time::interval(window.timings().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("SessionManager: Started, waiting for matches...");

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(event) = maybe else {
                    if let Some(session) = window.drain() {
                        info!("SessionManager: input closed, flushing open session");
                        emit(&out, session, FlushReason::Shutdown, &logger).await;
                    }
                    info!("SessionManager: all crawlers stopped");
                    return;
                };

                let Some(event) = dedup.admit(event) else {
                    continue;
                };
                log_accepted(&logger, &event);

                let game_id = event.summary.game_id.clone();
                info!("SessionManager: New match detected: {}", game_id);

                match window.push(event.summary, Utc::now()) {
                    PushOutcome::Started => {
                        info!("SessionManager: Started new session with match {}", game_id);
                    }
                    PushOutcome::Appended => {
                        info!("SessionManager: Added match {} to current session", game_id);
                    }
                    PushOutcome::Rolled(flushed) => {
                        info!("SessionManager: Match too far in time, flushing session");
                        if !emit(&out, flushed, FlushReason::Gap, &logger).await {
                            return;
                        }
                        info!("SessionManager: Started new session with match {}", game_id);
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(session) = window.tick(Utc::now()) {
                    info!("SessionManager: Inactivity timeout reached, flushing session");
                    if !emit(&out, session, FlushReason::Inactivity, &logger).await {
                        return;
                    }
                }
            }
        }
    }
}

/// `false` when the notifier is gone.
async fn emit(
    out:     &mpsc::Sender<Session>,
    session: Session,
    reason:  FlushReason,
    logger:  &EventLogger,
) -> bool {
    let _ = logger.log(&SessionFlushedEvent {
        ts:       now_iso(),
        event:    "SESSION_FLUSHED",
        reason:   reason.as_str(),
        matches:  session.len(),
        game_ids: session.game_ids(),
        last_match_end_time: session.last_match_end_time().to_rfc3339(),
    });

    if out.send(session).await.is_err() {
        warn!("SessionManager: notifier channel closed, stopping");
        return false;
    }
    true
}

fn log_accepted(logger: &EventLogger, event: &MatchEvent) {
    let _ = logger.log(&MatchAcceptedEvent {
        ts:          now_iso(),
        event:       "MATCH_ACCEPTED",
        game_id:     event.summary.game_id.clone(),
        player:      event.player.label(),
        map_name:    event.summary.map_name.clone(),
        finished_at: event.summary.finished_at.map(|t| t.to_rfc3339()),
    });
}
