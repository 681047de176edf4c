// Notifier tasks against in-memory stats, identity and webhook stand-ins.

use async_trait::async_trait;
use discord_notifier::{
    notify_replay, DeliveryError, Enricher, MatchNotifier, NotificationSink, NotifierTimings,
    Resolution, SessionNotifier, WebhookMessage,
};
use leetify_api::{
    FetchError, GameMode, MatchDetail, MatchOutcome, MatchSource, MatchSummary, PlayerRef,
    PlayerStats,
};
use logger::EventLogger;
use match_crawler::MatchEvent;
use session_engine::{Session, SessionWindow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use steam_api::{Identity, IdentityResolver};
use tokio::sync::mpsc;

const ALICE: &str = "76561198000000001";
const BOB: &str = "76561198000000002";
const ENEMY: &str = "76561198000000009";

#[derive(Default)]
struct FakeStats {
    details: HashMap<String, MatchDetail>,
    calls:   Mutex<Vec<(String, Instant)>>,
}

#[async_trait]
impl MatchSource for FakeStats {
    async fn list_matches(&self, _player: &PlayerRef) -> Result<Vec<MatchSummary>, FetchError> {
        Ok(Vec::new())
    }

    async fn match_detail(&self, game_id: &str) -> Result<MatchDetail, FetchError> {
        self.calls.lock().unwrap().push((game_id.to_string(), Instant::now()));
        self.details
            .get(game_id)
            .cloned()
            .ok_or_else(|| FetchError::Status { url: format!("http://stats.test/{game_id}"), status: 404 })
    }
}

#[derive(Default)]
struct FakeSteam {
    known: HashMap<String, Identity>,
    calls: Mutex<usize>,
}

#[async_trait]
impl IdentityResolver for FakeSteam {
    async fn resolve(&self, steam_ids: &[String]) -> HashMap<String, Identity> {
        *self.calls.lock().unwrap() += 1;
        steam_ids
            .iter()
            .filter_map(|id| self.known.get(id).map(|i| (id.clone(), i.clone())))
            .collect()
    }
}

#[derive(Default)]
struct RecordingSink {
    fail: bool,
    sent: Mutex<Vec<WebhookMessage>>,
}

impl RecordingSink {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn sent(&self) -> Vec<WebhookMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, message: &WebhookMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail {
            Err(DeliveryError::Status(500))
        } else {
            Ok(())
        }
    }
}

fn players() -> Vec<PlayerRef> {
    vec![
        PlayerRef::new(Some("alice"), Some(ALICE), true),
        PlayerRef::new(Some("bob"), Some(BOB), true),
    ]
}

fn summary(id: &str, outcome: MatchOutcome, scores: [i32; 2]) -> MatchSummary {
    MatchSummary {
        game_id: id.to_string(),
        own_team_steam64_ids: vec![ALICE.into(), BOB.into()],
        enemy_team_steam64_ids: vec![ENEMY.into()],
        data_source: "matchmaking_competitive".to_string(),
        game_mode: GameMode::Competitive,
        finished_at: None,
        map_name: "de_inferno".to_string(),
        outcome,
        scores: scores.to_vec(),
        own_score: scores[0],
        enemy_score: scores[1],
        rank_type: None,
        is_cs2: true,
    }
}

fn stats(id: &str, kills: i32, deaths: i32) -> PlayerStats {
    PlayerStats {
        steam64_id: id.to_string(),
        name: String::new(),
        team_number: 2,
        kills,
        deaths,
        mvps: 1,
        damage: 1500,
        kd_ratio: 1.0,
    }
}

fn detail(id: &str, players: Vec<PlayerStats>) -> MatchDetail {
    MatchDetail {
        game_id: id.to_string(),
        data_source: "matchmaking_competitive".to_string(),
        game_mode: GameMode::Competitive,
        finished_at: None,
        map_name: "de_inferno".to_string(),
        team_scores: vec![13, 7],
        players,
    }
}

fn identity(name: &str, country: &str) -> Identity {
    Identity { display_name: name.to_string(), country_code: country.to_string() }
}

fn instant() -> NotifierTimings {
    NotifierTimings { notify_delay: Duration::ZERO, detail_pacing: Duration::ZERO }
}

fn session_of(summaries: Vec<MatchSummary>) -> Session {
    let mut window = SessionWindow::default();
    let now = chrono::Utc::now();
    for s in summaries {
        window.push(s, now);
    }
    window.drain().unwrap()
}

#[tokio::test]
async fn match_is_reported_even_when_detail_is_missing() {
    let stats_api = Arc::new(FakeStats::default());
    let steam = Arc::new(FakeSteam {
        known: HashMap::from([(ALICE.to_string(), identity("alice", "DE"))]),
        ..Default::default()
    });
    let sink = Arc::new(RecordingSink::default());
    let notifier = MatchNotifier::new(
        Enricher::new(stats_api.clone(), steam, players()),
        sink.clone(),
        Arc::new(EventLogger::disabled()),
        instant(),
    );

    assert!(notifier.notify(&summary("g1", MatchOutcome::Win, [13, 7])).await);

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "🏆 :flag_de: Alice and Bob won the match!");
    let team = sent[0].embeds[0].fields.iter().find(|f| f.name == "Team").unwrap();
    assert!(team.value.contains("`?/?`"));
    assert_eq!(stats_api.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delivery_failure_is_not_retried() {
    let sink = Arc::new(RecordingSink::failing());
    let notifier = MatchNotifier::new(
        Enricher::new(Arc::new(FakeStats::default()), Arc::new(FakeSteam::default()), players()),
        sink.clone(),
        Arc::new(EventLogger::disabled()),
        instant(),
    );

    assert!(!notifier.notify(&summary("g1", MatchOutcome::Loss, [5, 13])).await);
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn match_notifier_drains_its_channel() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = MatchNotifier::new(
        Enricher::new(Arc::new(FakeStats::default()), Arc::new(FakeSteam::default()), players()),
        sink.clone(),
        Arc::new(EventLogger::disabled()),
        instant(),
    );

    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(notifier.run(rx));
    for id in ["a", "b"] {
        tx.send(MatchEvent { summary: summary(id, MatchOutcome::Tie, [12, 12]), player: players()[0].clone() })
            .await
            .unwrap();
    }
    drop(tx);
    task.await.unwrap();

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.content.starts_with("🤝")));
}

#[tokio::test]
async fn single_match_session_uses_match_format() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = SessionNotifier::new(
        Enricher::new(Arc::new(FakeStats::default()), Arc::new(FakeSteam::default()), players()),
        sink.clone(),
        Arc::new(EventLogger::disabled()),
        instant(),
    );

    assert!(notifier.notify(&session_of(vec![summary("solo", MatchOutcome::Win, [13, 2])])).await);
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.ends_with("won the match!"));
}

#[tokio::test]
async fn session_sends_one_summary_with_single_identity_lookup() {
    let stats_api = Arc::new(FakeStats {
        details: HashMap::from([
            ("m1".to_string(), detail("m1", vec![stats(ALICE, 0, 18), stats(BOB, 22, 10), stats(ENEMY, 15, 15)])),
            ("m2".to_string(), detail("m2", vec![stats(ALICE, 12, 12), stats(BOB, 9, 14), stats(ENEMY, 20, 10)])),
        ]),
        ..Default::default()
    });
    let steam = Arc::new(FakeSteam::default());
    let sink = Arc::new(RecordingSink::default());
    let notifier = SessionNotifier::new(
        Enricher::new(stats_api.clone(), steam.clone(), players()),
        sink.clone(),
        Arc::new(EventLogger::disabled()),
        instant(),
    );

    let session = session_of(vec![
        summary("m1", MatchOutcome::Win, [13, 7]),
        summary("m2", MatchOutcome::Loss, [10, 13]),
    ]);
    assert!(notifier.notify(&session).await);

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, ":video_game: Alice and Bob played 2 matches.");
    let fields = &sent[0].embeds[0].fields;
    let best = fields.iter().find(|f| f.name == "Best teammate").unwrap();
    assert!(best.value.contains("31 kills / 24 deaths"));
    // Alice's zero-kill match still counts as known stats.
    let worst = fields.iter().find(|f| f.name == "Worst teammate").unwrap();
    assert!(worst.value.contains("12 kills / 30 deaths"));

    assert_eq!(*steam.calls.lock().unwrap(), 1);
    assert_eq!(stats_api.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn session_detail_calls_are_paced() {
    let stats_api = Arc::new(FakeStats::default());
    let notifier = SessionNotifier::new(
        Enricher::new(stats_api.clone(), Arc::new(FakeSteam::default()), players()),
        Arc::new(RecordingSink::default()),
        Arc::new(EventLogger::disabled()),
        NotifierTimings { notify_delay: Duration::ZERO, detail_pacing: Duration::from_millis(50) },
    );

    let session = session_of(vec![
        summary("p1", MatchOutcome::Win, [13, 1]),
        summary("p2", MatchOutcome::Win, [13, 2]),
        summary("p3", MatchOutcome::Win, [13, 3]),
    ]);
    notifier.notify(&session).await;

    let calls = stats_api.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    let spread = calls[2].1.duration_since(calls[0].1);
    assert!(spread >= Duration::from_millis(80), "detail calls were not paced: {spread:?}");
}

#[tokio::test]
async fn replay_builds_teams_from_detail() {
    let stats_api = Arc::new(FakeStats {
        details: HashMap::from([(
            "r1".to_string(),
            detail("r1", vec![stats(ENEMY, 30, 5), stats(ALICE, 25, 9)]),
        )]),
        ..Default::default()
    });
    let steam = Arc::new(FakeSteam {
        known: HashMap::from([
            (ALICE.to_string(), identity("alice", "")),
            (ENEMY.to_string(), identity("rival", "PL")),
        ]),
        ..Default::default()
    });
    let enricher = Enricher::new(stats_api, steam, players());
    let sink = RecordingSink::default();

    let delivered = notify_replay(&enricher, &sink, &EventLogger::disabled(), "r1").await.unwrap();
    assert!(delivered);

    let sent = sink.sent();
    // Known profile without a country: globe instead of a flag.
    assert_eq!(sent[0].content, "🎮 :earth_americas: Alice finished a match.");
    assert!(sent[0].embeds[0].fields.iter().all(|f| f.name != "Score"));

    let replayed = enricher.enrich_replay("r1").await.unwrap();
    assert_eq!(replayed.resolution(), Resolution::Full);
}

#[tokio::test]
async fn replay_of_unknown_match_fails() {
    let enricher = Enricher::new(Arc::new(FakeStats::default()), Arc::new(FakeSteam::default()), players());
    let sink = RecordingSink::default();
    let result = notify_replay(&enricher, &sink, &EventLogger::disabled(), "missing").await;
    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    assert!(sink.sent().is_empty());
}
