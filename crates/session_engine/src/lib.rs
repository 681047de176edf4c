//! CS2 Match Notifier - Session engine
//!
//! Fan-in side of the pipeline. All crawler events land in one task which
//! drops repeated game ids and, in session mode, groups the rest into
//! sessions bounded by a finish-time gap and an inactivity timeout.

mod manager;
mod seen;
mod window;

pub use manager::{run_match_manager, run_session_manager};
pub use seen::{Deduplicator, MemorySeenSet, SeenSet, DEFAULT_SEEN_CAPACITY};
pub use window::{
    FlushReason, PushOutcome, Session, SessionTimings, SessionWindow, WindowState,
    GAP_THRESHOLD_MINS, INACTIVITY_TIMEOUT_MINS, TICK_INTERVAL_SECS,
};
