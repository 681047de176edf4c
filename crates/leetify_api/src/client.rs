use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::{DetailsResponse, FetchError, MatchDetail, MatchSource, MatchSummary, PlayerRef, ProfileResponse};

pub const DEFAULT_LEETIFY_API_URL: &str = "https://api.leetify.com";

/// Per-call deadline for the stats service.
const LEETIFY_TIMEOUT_SECS: u64 = 30;

pub struct LeetifyClient {
    client:   reqwest::Client,
    base_url: String,
}

impl LeetifyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(LEETIFY_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Vanity url wins over the numeric id when both are configured.
    pub fn profile_url(&self, player: &PlayerRef) -> Option<String> {
        if let Some(name) = player.account_name.as_deref().filter(|s| !s.is_empty()) {
            return Some(format!("{}/api/profile/vanity-url/{}", self.base_url, name));
        }
        player
            .steam_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|id| format!("{}/api/profile/id/{}", self.base_url, id))
    }

    pub fn detail_url(&self, game_id: &str) -> String {
        format!("{}/api/games/{}", self.base_url, game_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("Leetify: GET {}", url);

        let resp = self
            .client
            .get(url)
            .header("Origin", "https://leetify.com")
            .header("Referer", "https://leetify.com/")
            .send()
            .await
            .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let raw = resp
            .text()
            .await
            .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;

        serde_json::from_str(&raw).map_err(|source| FetchError::Decode { url: url.to_string(), source })
    }
}

#[async_trait]
impl MatchSource for LeetifyClient {
    async fn list_matches(&self, player: &PlayerRef) -> Result<Vec<MatchSummary>, FetchError> {
        let url = self.profile_url(player).ok_or(FetchError::NoIdentity)?;
        let profile: ProfileResponse = self.get_json(&url).await?;
        Ok(profile.games.into_iter().map(MatchSummary::from_response).collect())
    }

    async fn match_detail(&self, game_id: &str) -> Result<MatchDetail, FetchError> {
        let url = self.detail_url(game_id);
        let details: DetailsResponse = self.get_json(&url).await?;
        Ok(MatchDetail::from_response(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_vanity_url_over_steam_id() {
        let client = LeetifyClient::new("https://api.example.test/");
        let both = PlayerRef::new(Some("alice"), Some("765"), true);
        assert_eq!(
            client.profile_url(&both).as_deref(),
            Some("https://api.example.test/api/profile/vanity-url/alice")
        );

        let id_only = PlayerRef::new(None, Some("765"), true);
        assert_eq!(
            client.profile_url(&id_only).as_deref(),
            Some("https://api.example.test/api/profile/id/765")
        );

        assert_eq!(client.profile_url(&PlayerRef::default()), None);
    }

    #[tokio::test]
    async fn player_without_identity_is_rejected_before_any_request() {
        let client = LeetifyClient::new(DEFAULT_LEETIFY_API_URL);
        let err = client.list_matches(&PlayerRef::default()).await.unwrap_err();
        assert!(matches!(err, FetchError::NoIdentity));
        assert!(!err.is_decode());
    }
}
