//! CS2 Match Notifier - Crawler
//!
//! One crawler per tracked player:
//!   1. Fetches the match list once as a baseline (no events for it)
//!   2. Waits a warm-up delay so sibling crawlers do not start in lockstep
//!   3. Polls every few minutes, diffs against the last snapshot and emits
//!      new matches oldest first
//!
//! Fetch errors after the baseline are never fatal: the cycle is retried after
//! a short backoff with the snapshot left untouched.

use leetify_api::{FetchError, MatchSource, MatchSummary, PlayerRef};
use logger::{ApiStatusEvent, EventLogger, now_iso};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

pub const POLL_INTERVAL_SECS: u64 = 120;
pub const ERROR_BACKOFF_SECS: u64 = 60;
pub const WARMUP_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlerTimings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub warmup:        Duration,
}

impl Default for CrawlerTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            error_backoff: Duration::from_secs(ERROR_BACKOFF_SECS),
            warmup:        Duration::from_secs(WARMUP_SECS),
        }
    }
}

/// A newly discovered match and the player whose crawl found it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub summary: MatchSummary,
    pub player:  PlayerRef,
}

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("{player}: initial match list fetch failed: {source}")]
    Baseline {
        player: String,
        #[source]
        source: FetchError,
    },
}

/// Ascending finish time. Matches without a parsable finish time sort after
/// every dated match and keep their relative order.
pub fn finish_order(a: &MatchSummary, b: &MatchSummary) -> Ordering {
    match (a.finished_at, b.finished_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `current \ previous` by game id, oldest first.
pub fn find_new_matches(previous: &[MatchSummary], current: &[MatchSummary]) -> Vec<MatchSummary> {
    let mut known: HashSet<&str> = previous.iter().map(|m| m.game_id.as_str()).collect();

    let mut fresh: Vec<MatchSummary> = current
        .iter()
        .filter(|m| known.insert(m.game_id.as_str()))
        .cloned()
        .collect();

    fresh.sort_by(finish_order);
    fresh
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Upstream error, snapshot untouched.
    Failed,
    /// Zero visible matches, snapshot untouched.
    Empty,
    Checked { total: usize, new: usize },
    /// Nobody is listening any more.
    Closed,
}

pub struct Crawler {
    source:    Arc<dyn MatchSource>,
    player:    PlayerRef,
    label:     String,
    out:       mpsc::Sender<MatchEvent>,
    logger:    Arc<EventLogger>,
    timings:   CrawlerTimings,
    last_seen: Vec<MatchSummary>,
}

impl Crawler {
    pub fn new(
        source: Arc<dyn MatchSource>,
        player: PlayerRef,
        out:    mpsc::Sender<MatchEvent>,
        logger: Arc<EventLogger>,
    ) -> Self {
        let label = player.label();
        Self {
            source,
            player,
            label,
            out,
            logger,
            timings: CrawlerTimings::default(),
            last_seen: Vec::new(),
        }
    }

    pub fn with_timings(mut self, timings: CrawlerTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn last_seen(&self) -> &[MatchSummary] {
        &self.last_seen
    }

    /// Establishes the snapshot the first poll diffs against.
    pub async fn baseline(&mut self) -> Result<usize, CrawlerError> {
        match self.source.list_matches(&self.player).await {
            Ok(matches) => {
                self.log_api(true, "baseline", matches.len());
                self.last_seen = matches;
                Ok(self.last_seen.len())
            }
            Err(source) => {
                self.log_api(false, &source.to_string(), 0);
                Err(CrawlerError::Baseline { player: self.label.clone(), source })
            }
        }
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        let matches = match self.source.list_matches(&self.player).await {
            Ok(m) => m,
            Err(e) => {
                warn!("{}: Error: {}", self.label, e);
                self.log_api(false, &e.to_string(), 0);
                return PollOutcome::Failed;
            }
        };

        if matches.is_empty() {
            info!("{}: No matches found, retrying later", self.label);
            self.log_api(true, "empty", 0);
            return PollOutcome::Empty;
        }

        let fresh = find_new_matches(&self.last_seen, &matches);
        let new = fresh.len();
        for summary in fresh {
            info!("{}: New match found: {}", self.label, summary.game_id);
            let event = MatchEvent { summary, player: self.player.clone() };
            if self.out.send(event).await.is_err() {
                warn!("{}: event channel closed, stopping crawler", self.label);
                return PollOutcome::Closed;
            }
        }

        let total = matches.len();
        self.last_seen = matches;
        self.log_api(true, "ok", total);
        info!("{}: Checked {} matches, found {} new", self.label, total, new);
        PollOutcome::Checked { total, new }
    }

    /// Baseline, warm-up, then poll until the receiver goes away.
    /// Only the baseline fetch can fail.
    pub async fn run(mut self) -> Result<(), CrawlerError> {
        info!("{}: Crawler started", self.label);
        let previous = self.baseline().await?;
        info!("{}: {} previous matches", self.label, previous);

        sleep(self.timings.warmup).await;

        loop {
            let wait = match self.poll_once().await {
                PollOutcome::Failed => self.timings.error_backoff,
                PollOutcome::Empty | PollOutcome::Checked { .. } => self.timings.poll_interval,
                PollOutcome::Closed => return Ok(()),
            };
            sleep(wait).await;
        }
    }

    fn log_api(&self, ok: bool, message: &str, items: usize) {
        let _ = self.logger.log(&ApiStatusEvent {
            ts:      now_iso(),
            event:   "API_STATUS",
            source:  "leetify".to_string(),
            scope:   self.label.clone(),
            ok,
            message: message.to_string(),
            items,
        });
    }
}
