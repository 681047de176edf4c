//! Runtime configuration: a TOML file plus environment overrides.
//!
//! The file path comes from `CONFIG_FILE` (default `config.toml`). After the
//! file is read, `STEAM_API_KEY`, `DISCORD_HOOK`, `NOTIFIER_MODE`,
//! `REPLAY_GAME_ID` and `LEETIFY_API_URL` replace the matching keys.

use leetify_api::{PlayerRef, DEFAULT_LEETIFY_API_URL};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use steam_api::DEFAULT_STEAM_API_URL;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no players configured")]
    NoPlayers,

    #[error("no player has track = true")]
    NoTrackedPlayers,

    #[error("player #{0} has neither account_name nor steam_id")]
    PlayerWithoutIdentity(usize),

    #[error("replay mode needs replay_game_id")]
    MissingReplayGameId,

    #[error("unknown mode {0:?} (expected match, session or replay)")]
    InvalidMode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// One notification per detected match.
    Match,
    /// One summary per closed session.
    #[default]
    Session,
    /// Notify a single match by id, then exit.
    Replay,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "match" => Ok(Mode::Match),
            "session" => Ok(Mode::Session),
            "replay" => Ok(Mode::Replay),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Match => "match",
            Mode::Session => "session",
            Mode::Replay => "replay",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    mode:            Option<String>,
    leetify_api_url: Option<String>,
    steam_api_url:   Option<String>,
    steam_api_key:   Option<String>,
    discord_hook:    Option<String>,
    log_dir:         Option<PathBuf>,
    replay_game_id:  Option<String>,
    players:         Vec<PlayerRef>,
}

impl RawConfig {
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let slots = [
            ("STEAM_API_KEY", &mut self.steam_api_key),
            ("DISCORD_HOOK", &mut self.discord_hook),
            ("NOTIFIER_MODE", &mut self.mode),
            ("REPLAY_GAME_ID", &mut self.replay_game_id),
            ("LEETIFY_API_URL", &mut self.leetify_api_url),
        ];
        for (key, slot) in slots {
            if let Some(v) = env(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(v);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub mode:            Mode,
    pub leetify_api_url: String,
    pub steam_api_url:   String,
    pub steam_api_key:   String,
    /// Empty means dry-run: messages are logged instead of posted.
    pub discord_hook:    String,
    pub log_dir:         Option<PathBuf>,
    pub replay_game_id:  Option<String>,
    pub players:         Vec<PlayerRef>,
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (or `config.toml`) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(Path::new(&path), |key| std::env::var(key).ok())
    }

    pub fn from_file(
        path: &Path,
        env:  impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), players = raw.players.len(), "loaded config file");
        Self::from_raw(raw, env)
    }

    fn from_raw(mut raw: RawConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        raw.apply_env(env);

        let mode = match raw.mode.as_deref() {
            Some(m) => m.parse()?,
            None => Mode::default(),
        };
        let players: Vec<PlayerRef> = raw.players.into_iter().map(PlayerRef::normalized).collect();
        let replay_game_id = raw
            .replay_game_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let config = Self {
            mode,
            leetify_api_url: non_empty_or(raw.leetify_api_url, DEFAULT_LEETIFY_API_URL),
            steam_api_url: non_empty_or(raw.steam_api_url, DEFAULT_STEAM_API_URL),
            steam_api_key: raw.steam_api_key.unwrap_or_default().trim().to_string(),
            discord_hook: raw.discord_hook.unwrap_or_default().trim().to_string(),
            log_dir: raw.log_dir,
            replay_game_id,
            players,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.players.is_empty() {
            return Err(ConfigError::NoPlayers);
        }
        if let Some(idx) = self.players.iter().position(|p| !p.has_identity()) {
            return Err(ConfigError::PlayerWithoutIdentity(idx));
        }
        match self.mode {
            Mode::Match | Mode::Session if self.tracked_players().next().is_none() => {
                Err(ConfigError::NoTrackedPlayers)
            }
            Mode::Replay if self.replay_game_id.is_none() => Err(ConfigError::MissingReplayGameId),
            _ => Ok(()),
        }
    }

    /// Players that get a crawler.
    pub fn tracked_players(&self) -> impl Iterator<Item = &PlayerRef> {
        self.players.iter().filter(|p| p.track)
    }

    pub fn is_dry_run(&self) -> bool {
        self.discord_hook.is_empty()
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
