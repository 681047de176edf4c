use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ── Tracked players ──────────────────────────────────────────────────────────

/// Identity of a configured player. At least one of `account_name`
/// (vanity url) and `steam_id` must be non-empty to be usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub steam_id: Option<String>,
    #[serde(default)]
    pub track: bool,
}

impl PlayerRef {
    pub fn new(account_name: Option<&str>, steam_id: Option<&str>, track: bool) -> Self {
        Self {
            account_name: account_name.map(str::to_string),
            steam_id: steam_id.map(str::to_string),
            track,
        }
        .normalized()
    }

    /// Blank strings become `None`, surrounding whitespace is dropped.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            account_name: clean(self.account_name),
            steam_id: clean(self.steam_id),
            track: self.track,
        }
    }

    pub fn has_identity(&self) -> bool {
        self.account_name.as_deref().is_some_and(|s| !s.is_empty())
            || self.steam_id.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Short name used as a log prefix.
    pub fn label(&self) -> String {
        self.account_name
            .clone()
            .or_else(|| self.steam_id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn is_steam_id(&self, steam_id: &str) -> bool {
        self.steam_id.as_deref() == Some(steam_id)
    }
}

// ── Outcome / mode tags ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
    Tie,
    Unknown,
}

impl MatchOutcome {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "win" => MatchOutcome::Win,
            "loss" => MatchOutcome::Loss,
            "tie" => MatchOutcome::Tie,
            _ => MatchOutcome::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Competitive,
    Premier,
    Faceit,
    Unknown,
}

impl GameMode {
    pub fn from_source(data_source: &str) -> Self {
        match data_source {
            "matchmaking_competitive" => GameMode::Competitive,
            "matchmaking" => GameMode::Premier,
            "faceit" => GameMode::Faceit,
            _ => GameMode::Unknown,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Competitive => "Competitive",
            GameMode::Premier => "Premier",
            GameMode::Faceit => "Faceit",
            GameMode::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Splits the raw score pair into (own, enemy) from the tracked side's view.
///
/// A win gives the tracked side the higher score, a loss the lower one.
/// Ties and unknown results keep the order the API sent.
pub fn assign_scores(outcome: MatchOutcome, scores: &[i32]) -> (i32, i32) {
    let max = scores.iter().copied().max().unwrap_or(0);
    let min = scores.iter().copied().min().unwrap_or(0);
    match outcome {
        MatchOutcome::Win => (max, min),
        MatchOutcome::Loss => (min, max),
        MatchOutcome::Tie | MatchOutcome::Unknown => (
            scores.first().copied().unwrap_or(0),
            scores.get(1).copied().unwrap_or(0),
        ),
    }
}

pub fn parse_finish_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Raw API shapes ───────────────────────────────────────────────────────────

/// Decodes `null` the same way as a missing key.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default, deserialize_with = "null_default")]
    pub games: Vec<GameResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameResponse {
    #[serde(deserialize_with = "null_default")]
    pub game_id: String,
    #[serde(deserialize_with = "null_default")]
    pub own_team_steam64_ids: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub enemy_team_steam64_ids: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub data_source: String,
    #[serde(deserialize_with = "null_default")]
    pub game_finished_at: String,
    #[serde(deserialize_with = "null_default")]
    pub is_cs2: bool,
    #[serde(deserialize_with = "null_default")]
    pub map_name: String,
    #[serde(deserialize_with = "null_default")]
    pub match_result: String,
    pub rank_type: Option<i32>,
    #[serde(deserialize_with = "null_default")]
    pub scores: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailsResponse {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub player_stats: Vec<PlayerStatsResponse>,
    #[serde(deserialize_with = "null_default")]
    pub data_source: String,
    #[serde(deserialize_with = "null_default")]
    pub game_finished_at: String,
    #[serde(deserialize_with = "null_default")]
    pub map_name: String,
    #[serde(deserialize_with = "null_default")]
    pub team_scores: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStatsResponse {
    #[serde(rename = "steam64Id", deserialize_with = "null_default")]
    pub steam64_id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub initial_team_number: i32,
    #[serde(deserialize_with = "null_default")]
    pub mvps: i32,
    #[serde(deserialize_with = "null_default")]
    pub total_kills: i32,
    #[serde(deserialize_with = "null_default")]
    pub total_deaths: i32,
    #[serde(deserialize_with = "null_default")]
    pub kd_ratio: f64,
    #[serde(deserialize_with = "null_default")]
    pub total_damage: i32,
}

// ── Domain types ─────────────────────────────────────────────────────────────

/// A finished match as seen in a player's match list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub game_id:                String,
    pub own_team_steam64_ids:   Vec<String>,
    pub enemy_team_steam64_ids: Vec<String>,
    pub data_source:            String,
    pub game_mode:              GameMode,
    /// `None` when the API timestamp does not parse as RFC 3339.
    pub finished_at:            Option<DateTime<Utc>>,
    pub map_name:               String,
    pub outcome:                MatchOutcome,
    pub scores:                 Vec<i32>,
    pub own_score:              i32,
    pub enemy_score:            i32,
    pub rank_type:              Option<i32>,
    pub is_cs2:                 bool,
}

impl MatchSummary {
    pub fn from_response(game: GameResponse) -> Self {
        let outcome = MatchOutcome::from_tag(&game.match_result);
        let (own_score, enemy_score) = assign_scores(outcome, &game.scores);
        Self {
            finished_at: parse_finish_time(&game.game_finished_at),
            game_mode: GameMode::from_source(&game.data_source),
            game_id: game.game_id,
            own_team_steam64_ids: game.own_team_steam64_ids,
            enemy_team_steam64_ids: game.enemy_team_steam64_ids,
            data_source: game.data_source,
            map_name: game.map_name,
            outcome,
            scores: game.scores,
            own_score,
            enemy_score,
            rank_type: game.rank_type,
            is_cs2: game.is_cs2,
        }
    }

    /// Steam ids of both teams, own team first.
    pub fn all_steam_ids(&self) -> Vec<String> {
        self.own_team_steam64_ids
            .iter()
            .chain(self.enemy_team_steam64_ids.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub steam64_id:  String,
    pub name:        String,
    pub team_number: i32,
    pub kills:       i32,
    pub deaths:      i32,
    pub mvps:        i32,
    pub damage:      i32,
    pub kd_ratio:    f64,
}

/// Per-player statistics for one match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDetail {
    pub game_id:     String,
    pub data_source: String,
    pub game_mode:   GameMode,
    pub finished_at: Option<DateTime<Utc>>,
    pub map_name:    String,
    pub team_scores: Vec<i32>,
    pub players:     Vec<PlayerStats>,
}

impl MatchDetail {
    pub fn from_response(resp: DetailsResponse) -> Self {
        let players = resp
            .player_stats
            .into_iter()
            .map(|p| PlayerStats {
                steam64_id: p.steam64_id,
                name: p.name,
                team_number: p.initial_team_number,
                kills: p.total_kills,
                deaths: p.total_deaths,
                mvps: p.mvps,
                damage: p.total_damage,
                kd_ratio: p.kd_ratio,
            })
            .collect();

        Self {
            finished_at: parse_finish_time(&resp.game_finished_at),
            game_mode: GameMode::from_source(&resp.data_source),
            game_id: resp.id,
            data_source: resp.data_source,
            map_name: resp.map_name,
            team_scores: resp.team_scores,
            players,
        }
    }

    pub fn stats_for(&self, steam_id: &str) -> Option<&PlayerStats> {
        self.players.iter().find(|p| p.steam64_id == steam_id)
    }
}
