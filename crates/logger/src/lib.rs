//! CS2 Match Notifier - Logger
//! JSONL audit journal for the match pipeline

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: Option<PathBuf>,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: Some(dir) }
    }

    /// Journal that drops every event.
    pub fn disabled() -> Self {
        Self { log_dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.log_dir.is_some()
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let Some(dir) = &self.log_dir else {
            return Ok(());
        };
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct ApiStatusEvent {
    pub ts:           String,
    pub event:        &'static str,   // "API_STATUS"
    pub source:       String,         // "leetify" | "steam"
    pub scope:        String,         // player label or game id
    pub ok:           bool,
    pub message:      String,
    pub items:        usize,
}

#[derive(Serialize, Debug)]
pub struct MatchAcceptedEvent {
    pub ts:           String,
    pub event:        &'static str,   // "MATCH_ACCEPTED"
    pub game_id:      String,
    pub player:       String,
    pub map_name:     String,
    pub finished_at:  Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionFlushedEvent {
    pub ts:           String,
    pub event:        &'static str,   // "SESSION_FLUSHED"
    pub reason:       &'static str,   // "gap" | "inactivity" | "shutdown"
    pub matches:      usize,
    pub game_ids:     Vec<String>,
    pub last_match_end_time: String,
}

#[derive(Serialize, Debug)]
pub struct NotificationEvent {
    pub ts:           String,
    pub event:        &'static str,   // "NOTIFICATION"
    pub kind:         &'static str,   // "match" | "session" | "replay"
    pub game_ids:     Vec<String>,
    pub resolution:   String,
    pub ok:           bool,
    pub message:      String,
}
