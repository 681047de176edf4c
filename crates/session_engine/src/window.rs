use chrono::{DateTime, Duration, Utc};
use leetify_api::MatchSummary;
use match_crawler::finish_order;
use std::cmp::Ordering;

pub const GAP_THRESHOLD_MINS: i64 = 30;
pub const INACTIVITY_TIMEOUT_MINS: i64 = 45;
pub const TICK_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Max distance between two consecutive finish times inside one session.
    pub gap_threshold:      Duration,
    /// Wall-clock time after the last finish before an open session is closed.
    pub inactivity_timeout: Duration,
    pub tick_interval:      std::time::Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            gap_threshold:      Duration::minutes(GAP_THRESHOLD_MINS),
            inactivity_timeout: Duration::minutes(INACTIVITY_TIMEOUT_MINS),
            tick_interval:      std::time::Duration::from_secs(TICK_INTERVAL_SECS),
        }
    }
}

/// Consecutive matches judged to be one sitting. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    matches:             Vec<MatchSummary>,
    last_match_end_time: DateTime<Utc>,
}

impl Session {
    fn start(summary: MatchSummary, end: DateTime<Utc>) -> Self {
        Self { matches: vec![summary], last_match_end_time: end }
    }

    fn add(&mut self, summary: MatchSummary, end: DateTime<Utc>) {
        let pos = self
            .matches
            .partition_point(|m| finish_order(m, &summary) != Ordering::Greater);
        self.matches.insert(pos, summary);
        self.last_match_end_time = self.last_match_end_time.max(end);
    }

    pub fn matches(&self) -> &[MatchSummary] {
        &self.matches
    }

    pub fn into_matches(self) -> Vec<MatchSummary> {
        self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn last_match_end_time(&self) -> DateTime<Utc> {
        self.last_match_end_time
    }

    pub fn game_ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.game_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Empty,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Gap,
    Inactivity,
    Shutdown,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Gap => "gap",
            FlushReason::Inactivity => "inactivity",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Window was empty, a new session holds just this match.
    Started,
    Appended,
    /// Gap exceeded: the previous session is returned, a new one started.
    Rolled(Session),
}

/// Groups a deduplicated match stream into sessions.
///
/// `Empty` + match opens a session. `Open` + match either appends (gap within
/// threshold) or flushes and reopens. A periodic [`SessionWindow::tick`]
/// closes the session once no match has finished for the inactivity timeout.
#[derive(Debug)]
pub struct SessionWindow {
    timings: SessionTimings,
    current: Option<Session>,
}

impl SessionWindow {
    pub fn new(timings: SessionTimings) -> Self {
        Self { timings, current: None }
    }

    pub fn timings(&self) -> SessionTimings {
        self.timings
    }

    pub fn state(&self) -> WindowState {
        if self.current.is_some() {
            WindowState::Open
        } else {
            WindowState::Empty
        }
    }

    pub fn open_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// `now` stands in for the finish time of matches whose timestamp did not parse.
    pub fn push(&mut self, summary: MatchSummary, now: DateTime<Utc>) -> PushOutcome {
        let end = summary.finished_at.unwrap_or(now);

        let gap_threshold = self.timings.gap_threshold;
        let Some(session) = self.current.as_mut() else {
            self.current = Some(Session::start(summary, end));
            return PushOutcome::Started;
        };

        if end - session.last_match_end_time <= gap_threshold {
            session.add(summary, end);
            return PushOutcome::Appended;
        }

        let flushed = std::mem::replace(session, Session::start(summary, end));
        PushOutcome::Rolled(flushed)
    }

    /// Periodic inactivity check.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|s| now - s.last_match_end_time > self.timings.inactivity_timeout);
        if expired {
            self.current.take()
        } else {
            None
        }
    }

    /// Closes whatever is open.
    pub fn drain(&mut self) -> Option<Session> {
        self.current.take()
    }
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self::new(SessionTimings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use leetify_api::{GameMode, MatchOutcome};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    fn summary(id: &str, finished_at: Option<DateTime<Utc>>) -> MatchSummary {
        MatchSummary {
            game_id: id.to_string(),
            own_team_steam64_ids: vec![],
            enemy_team_steam64_ids: vec![],
            data_source: "matchmaking".to_string(),
            game_mode: GameMode::Premier,
            finished_at,
            map_name: "de_ancient".to_string(),
            outcome: MatchOutcome::Loss,
            scores: vec![13, 11],
            own_score: 11,
            enemy_score: 13,
            rank_type: None,
            is_cs2: true,
        }
    }

    fn after(mins: i64) -> Option<DateTime<Utc>> {
        Some(t0() + Duration::minutes(mins))
    }

    #[test]
    fn first_match_opens_a_session() {
        let mut window = SessionWindow::default();
        assert_eq!(window.state(), WindowState::Empty);
        assert_eq!(window.push(summary("a", after(0)), t0()), PushOutcome::Started);
        assert_eq!(window.state(), WindowState::Open);
        assert_eq!(window.open_session().unwrap().last_match_end_time(), t0());
    }

    #[test]
    fn match_within_gap_appends() {
        let mut window = SessionWindow::default();
        window.push(summary("a", after(0)), t0());
        assert_eq!(window.push(summary("b", after(29)), t0()), PushOutcome::Appended);

        let session = window.open_session().unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.last_match_end_time(), t0() + Duration::minutes(29));
    }

    #[test]
    fn gap_exactly_at_threshold_still_appends() {
        let mut window = SessionWindow::default();
        window.push(summary("a", after(0)), t0());
        assert_eq!(window.push(summary("b", after(30)), t0()), PushOutcome::Appended);
    }

    #[test]
    fn gap_is_measured_from_the_latest_match() {
        let mut window = SessionWindow::default();
        window.push(summary("m1", after(0)), t0());
        window.push(summary("m2", after(10)), t0());
        // 40 minutes after m1 but only 30 after m2.
        assert_eq!(window.push(summary("m3", after(40)), t0()), PushOutcome::Appended);
        assert_eq!(window.open_session().unwrap().len(), 3);
    }

    #[test]
    fn match_beyond_gap_flushes_and_restarts() {
        let mut window = SessionWindow::default();
        window.push(summary("a", after(0)), t0());

        let PushOutcome::Rolled(flushed) = window.push(summary("b", after(31)), t0()) else {
            panic!("expected the open session to be flushed");
        };
        assert_eq!(flushed.game_ids(), vec!["a"]);

        let open = window.open_session().unwrap();
        assert_eq!(open.game_ids(), vec!["b"]);
        assert_eq!(window.state(), WindowState::Open);
    }

    #[test]
    fn inactivity_tick_flushes_only_after_timeout() {
        let mut window = SessionWindow::default();
        window.push(summary("a", after(0)), t0());

        assert!(window.tick(t0() + Duration::minutes(44)).is_none());
        assert_eq!(window.state(), WindowState::Open);

        let flushed = window.tick(t0() + Duration::minutes(46)).unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(window.state(), WindowState::Empty);
    }

    #[test]
    fn tick_on_empty_window_is_a_noop() {
        let mut window = SessionWindow::default();
        assert!(window.tick(t0() + Duration::days(1)).is_none());
        assert_eq!(window.state(), WindowState::Empty);
    }

    #[test]
    fn three_matches_with_late_third_give_two_then_one() {
        let mut window = SessionWindow::default();
        assert_eq!(window.push(summary("m1", after(0)), t0()), PushOutcome::Started);
        assert_eq!(window.push(summary("m2", after(10)), t0()), PushOutcome::Appended);

        // The gap is measured from m2: 31 minutes.
        let PushOutcome::Rolled(flushed) = window.push(summary("m3", after(41)), t0()) else {
            panic!("expected a flush before the third match");
        };
        assert_eq!(flushed.game_ids(), vec!["m1", "m2"]);
        assert_eq!(window.open_session().unwrap().len(), 1);
    }

    #[test]
    fn interleaved_earlier_match_is_kept_in_finish_order() {
        let mut window = SessionWindow::default();
        window.push(summary("late", after(20)), t0());
        assert_eq!(window.push(summary("early", after(5)), t0()), PushOutcome::Appended);

        let session = window.open_session().unwrap();
        assert_eq!(session.game_ids(), vec!["early", "late"]);
        assert_eq!(session.last_match_end_time(), t0() + Duration::minutes(20));
    }

    #[test]
    fn undated_match_uses_receipt_time() {
        let mut window = SessionWindow::default();
        let now = t0() + Duration::minutes(90);
        window.push(summary("a", after(0)), now);

        let PushOutcome::Rolled(_) = window.push(summary("undated", None), now) else {
            panic!("receipt time is 90 minutes after the last finish");
        };
        assert_eq!(window.open_session().unwrap().last_match_end_time(), now);
    }

    #[test]
    fn drain_closes_the_open_session() {
        let mut window = SessionWindow::default();
        window.push(summary("a", after(0)), t0());
        assert_eq!(window.drain().unwrap().len(), 1);
        assert!(window.drain().is_none());
    }
}
