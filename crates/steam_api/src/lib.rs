//! Steam Web API - persona names and countries for steam ids.
//!
//! Identity lookup is best-effort: [`IdentityResolver::resolve`] never fails,
//! it returns whatever it managed to fetch. Callers treat a missing entry as
//! "unknown identity".

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_STEAM_API_URL: &str = "https://api.steampowered.com";

/// GetPlayerSummaries accepts at most this many ids per call.
const MAX_IDS_PER_CALL: usize = 100;
const STEAM_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    /// ISO 3166 alpha-2, empty when the profile does not publish one.
    pub country_code: String,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, steam_ids: &[String]) -> HashMap<String, Identity>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("steam request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("steam returned HTTP {0}")]
    Status(u16),

    #[error("failed to decode steam response: {0}")]
    Decode(#[source] serde_json::Error),
}

// ── Response shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PlayerSummaryResponse {
    response: PlayerSummaryList,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerSummaryList {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    steamid: String,
    #[serde(default)]
    personaname: String,
    #[serde(default)]
    loccountrycode: String,
}

/// Keeps ids that are valid 64-bit numbers, first occurrence only.
pub fn valid_steam_ids(steam_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    steam_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| id.parse::<u64>().is_ok())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

pub struct SteamClient {
    client:   reqwest::Client,
    base_url: String,
    api_key:  String,
}

impl SteamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(STEAM_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn fetch_chunk(&self, ids: &[String]) -> Result<Vec<PlayerSummary>, IdentityError> {
        let url = format!("{}/ISteamUser/GetPlayerSummaries/v2/", self.base_url);
        let joined = ids.join(",");

        let resp = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("steamids", joined.as_str())])
            .send()
            .await
            .map_err(IdentityError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status.as_u16()));
        }

        let raw = resp.text().await.map_err(IdentityError::Transport)?;
        let parsed: PlayerSummaryResponse = serde_json::from_str(&raw).map_err(IdentityError::Decode)?;
        Ok(parsed.response.players)
    }
}

#[async_trait]
impl IdentityResolver for SteamClient {
    async fn resolve(&self, steam_ids: &[String]) -> HashMap<String, Identity> {
        let ids = valid_steam_ids(steam_ids);
        let mut resolved = HashMap::new();

        for chunk in ids.chunks(MAX_IDS_PER_CALL) {
            match self.fetch_chunk(chunk).await {
                Ok(players) => {
                    for p in players {
                        resolved.insert(
                            p.steamid,
                            Identity { display_name: p.personaname, country_code: p.loccountrycode },
                        );
                    }
                }
                Err(e) => warn!("Steam: failed to resolve {} players: {}", chunk.len(), e),
            }
        }

        debug!("Steam: resolved {}/{} identities", resolved.len(), ids.len());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_invalid_and_duplicate_ids() {
        let ids = vec![
            "76561198000000001".to_string(),
            "BOT".to_string(),
            "76561198000000001".to_string(),
            " 76561198000000002 ".to_string(),
            "".to_string(),
        ];
        assert_eq!(
            valid_steam_ids(&ids),
            vec!["76561198000000001".to_string(), "76561198000000002".to_string()]
        );
    }

    #[test]
    fn decodes_player_summaries() {
        let raw = r#"{"response":{"players":[
            {"steamid":"1","personaname":"alice","loccountrycode":"FR"},
            {"steamid":"2","personaname":"bob"}
        ]}}"#;
        let parsed: PlayerSummaryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.response.players.len(), 2);
        assert_eq!(parsed.response.players[1].loccountrycode, "");
    }

    #[tokio::test]
    async fn nothing_to_resolve_makes_no_request() {
        let client = SteamClient::new("http://127.0.0.1:9", "key");
        let out = client.resolve(&["not-a-number".to_string()]).await;
        assert!(out.is_empty());
    }
}
