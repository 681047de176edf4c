use chrono::{DateTime, Utc};
use leetify_api::{FetchError, GameMode, MatchDetail, MatchOutcome, MatchSource, MatchSummary, PlayerRef, PlayerStats};
use std::collections::HashMap;
use std::sync::Arc;
use steam_api::{Identity, IdentityResolver};
use tracing::warn;

// ── Enriched shapes ──────────────────────────────────────────────────────────

/// How much of a match could be filled in from the identity and detail calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every player has both an identity and stats.
    Full,
    Partial,
    /// No player has either.
    Unresolved,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Full => "full",
            Resolution::Partial => "partial",
            Resolution::Unresolved => "unresolved",
        }
    }

    fn combine(items: impl IntoIterator<Item = Resolution>) -> Resolution {
        let (mut any, mut all_full, mut all_unresolved) = (false, true, true);
        for r in items {
            any = true;
            all_full &= r == Resolution::Full;
            all_unresolved &= r == Resolution::Unresolved;
        }
        match (any, all_full, all_unresolved) {
            (false, _, _) | (_, _, true) => Resolution::Unresolved,
            (_, true, _) => Resolution::Full,
            _ => Resolution::Partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPlayer {
    pub steam_id: String,
    /// `None` when the identity lookup had no entry for this id.
    pub identity: Option<Identity>,
    /// `None` when match details were unavailable, distinct from zero kills.
    pub stats:    Option<PlayerStats>,
    /// Listed in the configured player set.
    pub tracked:  bool,
    configured_name: Option<String>,
}

impl EnrichedPlayer {
    fn new(
        steam_id:   &str,
        identities: &HashMap<String, Identity>,
        detail:     Option<&MatchDetail>,
        known:      &[PlayerRef],
    ) -> Self {
        let configured = known.iter().find(|p| p.is_steam_id(steam_id));
        Self {
            steam_id: steam_id.to_string(),
            identity: identities.get(steam_id).cloned(),
            stats: detail.and_then(|d| d.stats_for(steam_id)).cloned(),
            tracked: configured.is_some(),
            configured_name: configured.and_then(|p| p.account_name.clone()),
        }
    }

    /// Persona name, then configured account name, then stats name, then the raw id.
    pub fn display_name(&self) -> String {
        self.identity
            .as_ref()
            .map(|i| i.display_name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| self.configured_name.clone())
            .or_else(|| self.stats.as_ref().map(|s| s.name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| self.steam_id.clone())
    }

    fn resolution(&self) -> Resolution {
        match (self.identity.is_some(), self.stats.is_some()) {
            (true, true) => Resolution::Full,
            (false, false) => Resolution::Unresolved,
            _ => Resolution::Partial,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTeam {
    pub score:   i32,
    pub players: Vec<EnrichedPlayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedMatch {
    pub game_id:     String,
    pub game_mode:   GameMode,
    pub finished_at: Option<DateTime<Utc>>,
    pub map_name:    String,
    pub outcome:     MatchOutcome,
    pub own_team:    EnrichedTeam,
    pub enemy_team:  EnrichedTeam,
}

impl EnrichedMatch {
    pub fn resolution(&self) -> Resolution {
        Resolution::combine(self.players().map(EnrichedPlayer::resolution))
    }

    pub fn players(&self) -> impl Iterator<Item = &EnrichedPlayer> {
        self.own_team.players.iter().chain(self.enemy_team.players.iter())
    }

    /// Configured players on the own team, or the whole own team if none are.
    pub fn headline_players(&self) -> Vec<&EnrichedPlayer> {
        let tracked: Vec<_> = self.own_team.players.iter().filter(|p| p.tracked).collect();
        if tracked.is_empty() {
            self.own_team.players.iter().collect()
        } else {
            tracked
        }
    }
}

/// Session totals for one configured teammate.
#[derive(Debug, Clone, PartialEq)]
pub struct TeammateTotals {
    pub player: EnrichedPlayer,
    pub kills:  i32,
    pub deaths: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSession {
    pub matches: Vec<EnrichedMatch>,
}

impl EnrichedSession {
    pub fn resolution(&self) -> Resolution {
        Resolution::combine(self.matches.iter().map(EnrichedMatch::resolution))
    }

    /// Configured players who were on the own team at least once, first appearance order.
    pub fn known_players(&self) -> Vec<&EnrichedPlayer> {
        let mut out: Vec<&EnrichedPlayer> = Vec::new();
        for m in &self.matches {
            for p in m.own_team.players.iter().filter(|p| p.tracked) {
                if !out.iter().any(|k| k.steam_id == p.steam_id) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Kills and deaths summed over every match with known stats.
    /// Players without stats in any match are left out.
    pub fn teammate_totals(&self) -> Vec<TeammateTotals> {
        let mut totals: Vec<TeammateTotals> = Vec::new();
        for m in &self.matches {
            for p in m.own_team.players.iter().filter(|p| p.tracked) {
                let Some(stats) = &p.stats else { continue };
                match totals.iter_mut().find(|t| t.player.steam_id == p.steam_id) {
                    Some(t) => {
                        t.kills += stats.kills;
                        t.deaths += stats.deaths;
                    }
                    None => totals.push(TeammateTotals {
                        player: p.clone(),
                        kills:  stats.kills,
                        deaths: stats.deaths,
                    }),
                }
            }
        }
        totals
    }

    pub fn best_teammate(&self) -> Option<TeammateTotals> {
        self.teammate_totals()
            .into_iter()
            .reduce(|best, t| if t.kills > best.kills { t } else { best })
    }

    pub fn worst_teammate(&self) -> Option<TeammateTotals> {
        self.teammate_totals()
            .into_iter()
            .reduce(|worst, t| if t.kills < worst.kills { t } else { worst })
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

/// Configured players first, the rest in their original order.
fn tracked_first(mut players: Vec<EnrichedPlayer>) -> Vec<EnrichedPlayer> {
    players.sort_by_key(|p| !p.tracked);
    players
}

pub fn build_match(
    summary:    &MatchSummary,
    detail:     Option<&MatchDetail>,
    identities: &HashMap<String, Identity>,
    known:      &[PlayerRef],
) -> EnrichedMatch {
    let own = summary
        .own_team_steam64_ids
        .iter()
        .map(|id| EnrichedPlayer::new(id, identities, detail, known))
        .collect();
    let enemy = summary
        .enemy_team_steam64_ids
        .iter()
        .map(|id| EnrichedPlayer::new(id, identities, detail, known))
        .collect();

    EnrichedMatch {
        game_id: summary.game_id.clone(),
        game_mode: summary.game_mode,
        finished_at: summary.finished_at,
        map_name: summary.map_name.clone(),
        outcome: summary.outcome,
        own_team: EnrichedTeam { score: summary.own_score, players: tracked_first(own) },
        enemy_team: EnrichedTeam { score: summary.enemy_score, players: enemy },
    }
}

/// Builds a match from its detail alone: configured players form the own
/// team, everyone else the enemy. Outcome and score stay unknown.
pub fn build_from_detail(
    detail:     &MatchDetail,
    identities: &HashMap<String, Identity>,
    known:      &[PlayerRef],
) -> EnrichedMatch {
    let (own, enemy): (Vec<_>, Vec<_>) = detail
        .players
        .iter()
        .map(|p| EnrichedPlayer::new(&p.steam64_id, identities, Some(detail), known))
        .partition(|p| p.tracked);

    EnrichedMatch {
        game_id: detail.game_id.clone(),
        game_mode: detail.game_mode,
        finished_at: detail.finished_at,
        map_name: detail.map_name.clone(),
        outcome: MatchOutcome::Unknown,
        own_team: EnrichedTeam { score: 0, players: own },
        enemy_team: EnrichedTeam { score: 0, players: enemy },
    }
}

// ── Enricher ─────────────────────────────────────────────────────────────────

/// Best-effort enrichment: failures are logged and leave fields empty.
pub struct Enricher {
    source:     Arc<dyn MatchSource>,
    identities: Arc<dyn IdentityResolver>,
    known:      Vec<PlayerRef>,
}

impl Enricher {
    pub fn new(
        source:     Arc<dyn MatchSource>,
        identities: Arc<dyn IdentityResolver>,
        known:      Vec<PlayerRef>,
    ) -> Self {
        Self { source, identities, known }
    }

    pub async fn resolve_identities(&self, steam_ids: &[String]) -> HashMap<String, Identity> {
        self.identities.resolve(steam_ids).await
    }

    pub async fn fetch_detail(&self, game_id: &str) -> Option<MatchDetail> {
        match self.source.match_detail(game_id).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!("Notifier: Warning: failed to get match details for {}: {}", game_id, e);
                None
            }
        }
    }

    pub fn build(
        &self,
        summary:    &MatchSummary,
        detail:     Option<&MatchDetail>,
        identities: &HashMap<String, Identity>,
    ) -> EnrichedMatch {
        build_match(summary, detail, identities, &self.known)
    }

    /// One-shot lookup by id; here the detail call is the only data source,
    /// so its failure is returned.
    pub async fn enrich_replay(&self, game_id: &str) -> Result<EnrichedMatch, FetchError> {
        let detail = self.source.match_detail(game_id).await?;
        let ids: Vec<String> = detail.players.iter().map(|p| p.steam64_id.clone()).collect();
        let identities = self.identities.resolve(&ids).await;
        Ok(build_from_detail(&detail, &identities, &self.known))
    }
}
