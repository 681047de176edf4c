//! CS2 Match Notifier - Discord side
//!
//! Turns detected matches and closed sessions into Discord webhook messages.
//! Player names and stats are filled in best-effort; whatever could not be
//! fetched is reported through [`Resolution`] instead of being zeroed.

mod enrich;
mod format;
mod webhook;

pub use enrich::{
    build_from_detail, build_match, EnrichedMatch, EnrichedPlayer, EnrichedSession, EnrichedTeam,
    Enricher, Resolution, TeammateTotals,
};
pub use format::{
    country_flag, find_mvp, join_names, match_header, match_link, match_message, outcome_emoji,
    profile_link, session_header, session_message, title_case, UNKNOWN_COUNTRY_FLAG,
    WEBHOOK_USERNAME,
};
pub use webhook::{
    DeliveryError, DryRunSink, Embed, EmbedField, NotificationSink, WebhookClient, WebhookMessage,
};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use leetify_api::{FetchError, MatchSummary};
use logger::{now_iso, EventLogger, NotificationEvent};
use match_crawler::MatchEvent;
use session_engine::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const NOTIFY_DELAY_SECS: u64 = 5;
pub const DETAIL_PACING_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierTimings {
    /// Wait before enriching a fresh match so the stats service can finish
    /// processing it.
    pub notify_delay:  Duration,
    /// Minimum spacing between detail calls. Zero disables pacing.
    pub detail_pacing: Duration,
}

impl Default for NotifierTimings {
    fn default() -> Self {
        Self {
            notify_delay:  Duration::from_secs(NOTIFY_DELAY_SECS),
            detail_pacing: Duration::from_secs(DETAIL_PACING_SECS),
        }
    }
}

/// Shared by both notifier tasks: enrichment, pacing, delivery, journal.
struct Courier {
    enricher: Enricher,
    sink:     Arc<dyn NotificationSink>,
    logger:   Arc<EventLogger>,
    timings:  NotifierTimings,
    pacer:    Option<DefaultDirectRateLimiter>,
}

impl Courier {
    fn new(
        enricher: Enricher,
        sink:     Arc<dyn NotificationSink>,
        logger:   Arc<EventLogger>,
        timings:  NotifierTimings,
    ) -> Self {
        let pacer = Quota::with_period(timings.detail_pacing).map(RateLimiter::direct);
        Self { enricher, sink, logger, timings, pacer }
    }

    async fn paced_detail(&self, game_id: &str) -> Option<leetify_api::MatchDetail> {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
        self.enricher.fetch_detail(game_id).await
    }

    async fn enrich_one(&self, summary: &MatchSummary) -> EnrichedMatch {
        let identities = self.enricher.resolve_identities(&summary.all_steam_ids()).await;
        let detail = self.paced_detail(&summary.game_id).await;
        self.enricher.build(summary, detail.as_ref(), &identities)
    }

    /// One identity lookup for the whole session, then paced detail calls.
    async fn enrich_many(&self, summaries: &[MatchSummary]) -> EnrichedSession {
        let mut ids: Vec<String> = Vec::new();
        for s in summaries {
            for id in s.all_steam_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        let identities = self.enricher.resolve_identities(&ids).await;

        let mut matches = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let detail = self.paced_detail(&summary.game_id).await;
            matches.push(self.enricher.build(summary, detail.as_ref(), &identities));
        }
        EnrichedSession { matches }
    }

    /// Delivery failures are logged and dropped.
    async fn send(
        &self,
        kind:       &'static str,
        game_ids:   Vec<String>,
        resolution: Resolution,
        message:    &WebhookMessage,
    ) -> bool {
        let result = self.sink.deliver(message).await;
        let (ok, detail) = match &result {
            Ok(()) => (true, "delivered".to_string()),
            Err(e) => (false, e.to_string()),
        };

        if ok {
            info!("Notifier: sent {} notification for {:?} ({})", kind, game_ids, resolution.as_str());
        } else {
            warn!("Notifier: Error sending {} notification for {:?}: {}", kind, game_ids, detail);
        }

        let _ = self.logger.log(&NotificationEvent {
            ts:         now_iso(),
            event:      "NOTIFICATION",
            kind,
            game_ids,
            resolution: resolution.as_str().to_string(),
            ok,
            message:    detail,
        });
        ok
    }

    async fn single(&self, summary: &MatchSummary) -> bool {
        let enriched = self.enrich_one(summary).await;
        let message = match_message(&enriched);
        self.send("match", vec![enriched.game_id.clone()], enriched.resolution(), &message)
            .await
    }
}

/// Match mode: one message per detected match.
pub struct MatchNotifier {
    courier: Courier,
}

impl MatchNotifier {
    pub fn new(
        enricher: Enricher,
        sink:     Arc<dyn NotificationSink>,
        logger:   Arc<EventLogger>,
        timings:  NotifierTimings,
    ) -> Self {
        Self { courier: Courier::new(enricher, sink, logger, timings) }
    }

    /// `true` when the message was delivered.
    pub async fn notify(&self, summary: &MatchSummary) -> bool {
        tokio::time::sleep(self.courier.timings.notify_delay).await;
        self.courier.single(summary).await
    }

    pub async fn run(self, mut rx: mpsc::Receiver<MatchEvent>) {
        info!("Notifier: waiting for matches...");
        while let Some(event) = rx.recv().await {
            info!(
                "Notifier: notifying match {} (seen by {})",
                event.summary.game_id,
                event.player.label()
            );
            self.notify(&event.summary).await;
        }
        info!("Notifier: match channel closed, stopping");
    }
}

/// Session mode: one summary per closed session, or the single-match format
/// when the session holds one match.
pub struct SessionNotifier {
    courier: Courier,
}

impl SessionNotifier {
    pub fn new(
        enricher: Enricher,
        sink:     Arc<dyn NotificationSink>,
        logger:   Arc<EventLogger>,
        timings:  NotifierTimings,
    ) -> Self {
        Self { courier: Courier::new(enricher, sink, logger, timings) }
    }

    pub async fn notify(&self, session: &Session) -> bool {
        tokio::time::sleep(self.courier.timings.notify_delay).await;

        if let [only] = session.matches() {
            return self.courier.single(only).await;
        }

        let enriched = self.courier.enrich_many(session.matches()).await;
        let message = session_message(&enriched);
        self.courier
            .send("session", session.game_ids(), enriched.resolution(), &message)
            .await
    }

    pub async fn run(self, mut rx: mpsc::Receiver<Session>) {
        info!("Notifier: waiting for sessions...");
        while let Some(session) = rx.recv().await {
            info!("Notifier: notifying session of {} matches", session.len());
            self.notify(&session).await;
        }
        info!("Notifier: session channel closed, stopping");
    }
}

/// Replay mode: fetch one match by id, notify, return. A failed detail call
/// is returned since there is nothing else to build the message from.
pub async fn notify_replay(
    enricher: &Enricher,
    sink:     &dyn NotificationSink,
    logger:   &EventLogger,
    game_id:  &str,
) -> Result<bool, FetchError> {
    let enriched = enricher.enrich_replay(game_id).await?;
    let message = match_message(&enriched);
    let resolution = enriched.resolution();

    let result = sink.deliver(&message).await;
    let ok = result.is_ok();
    match &result {
        Ok(()) => info!("Notifier: replayed match {} ({})", game_id, resolution.as_str()),
        Err(e) => warn!("Notifier: Error sending replay for {}: {}", game_id, e),
    }

    let _ = logger.log(&NotificationEvent {
        ts:         now_iso(),
        event:      "NOTIFICATION",
        kind:       "replay",
        game_ids:   vec![game_id.to_string()],
        resolution: resolution.as_str().to_string(),
        ok,
        message:    result.err().map(|e| e.to_string()).unwrap_or_else(|| "delivered".to_string()),
    });
    Ok(ok)
}
