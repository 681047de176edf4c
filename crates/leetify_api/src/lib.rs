//! Leetify stats API - match listing and per-match details.
//!
//! This crate is the `MatchSource` boundary of the notifier: it knows how to
//! ask the stats service for a player's recent matches and for the per-player
//! statistics of one match. Everything downstream works on [`MatchSummary`]
//! and [`MatchDetail`], never on the raw response shapes.

mod client;
mod model;

pub use client::{LeetifyClient, DEFAULT_LEETIFY_API_URL};
pub use model::{
    assign_scores, parse_finish_time, DetailsResponse, GameMode, GameResponse, MatchDetail,
    MatchOutcome, MatchSummary, PlayerRef, PlayerStats, PlayerStatsResponse, ProfileResponse,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("player has neither an account name nor a steam id")]
    NoIdentity,
}

impl FetchError {
    /// Malformed body, as opposed to an unreachable or failing upstream.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }
}

/// Read-only source of finished matches.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Current list of completed matches for one player, in API order.
    async fn list_matches(&self, player: &PlayerRef) -> Result<Vec<MatchSummary>, FetchError>;

    /// Full per-player statistics for one match.
    async fn match_detail(&self, game_id: &str) -> Result<MatchDetail, FetchError>;
}
