//! Discord rendering of enriched matches and sessions.

use leetify_api::MatchOutcome;

use crate::enrich::{EnrichedMatch, EnrichedPlayer, EnrichedSession, TeammateTotals};
use crate::webhook::{
    Embed, EmbedField, WebhookMessage, COLOR_LOSS, COLOR_NEUTRAL, COLOR_SESSION, COLOR_WIN,
};

const MATCH_URL: &str = "https://leetify.com/public/match-details";
const PROFILE_URL: &str = "https://leetify.com/public/profile";

/// Discord rejects embed field values longer than this.
const FIELD_VALUE_LIMIT: usize = 1024;

pub const WEBHOOK_USERNAME: &str = "CS2";
pub const UNKNOWN_COUNTRY_FLAG: &str = ":earth_americas:";

pub fn match_link(game_id: &str) -> String {
    format!("{}/{}/details-general", MATCH_URL, game_id)
}

pub fn profile_link(steam_id: &str) -> String {
    format!("{}/{}", PROFILE_URL, steam_id)
}

pub fn outcome_emoji(outcome: MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Win => "🏆",
        MatchOutcome::Loss => "💀",
        MatchOutcome::Tie => "🤝",
        MatchOutcome::Unknown => "🎮",
    }
}

fn outcome_color(outcome: MatchOutcome) -> u32 {
    match outcome {
        MatchOutcome::Win => COLOR_WIN,
        MatchOutcome::Loss => COLOR_LOSS,
        MatchOutcome::Tie | MatchOutcome::Unknown => COLOR_NEUTRAL,
    }
}

fn outcome_phrase(outcome: MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Win => "won the match!",
        MatchOutcome::Loss => "lost the match.",
        MatchOutcome::Tie => "tied the match.",
        MatchOutcome::Unknown => "finished a match.",
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "A", "A and B", "A, B and C".
pub fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// `:flag_xx:` shortcode for a two-letter country code, a globe otherwise.
pub fn country_flag(code: &str) -> String {
    let code = code.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        format!(":flag_{}:", code.to_ascii_lowercase())
    } else {
        UNKNOWN_COUNTRY_FLAG.to_string()
    }
}

/// No flag at all when the identity lookup had nothing for this player.
fn player_flag(player: &EnrichedPlayer) -> Option<String> {
    player.identity.as_ref().map(|i| country_flag(&i.country_code))
}

fn player_name(player: &EnrichedPlayer) -> String {
    let name = title_case(&player.display_name());
    match player_flag(player) {
        Some(flag) => format!("{} {}", flag, name),
        None => name,
    }
}

fn player_mention(player: &EnrichedPlayer) -> String {
    let name = title_case(&player.display_name());
    let link = format!("[{}]({})", name, profile_link(&player.steam_id));
    match player_flag(player) {
        Some(flag) => format!("{} {}", flag, link),
        None => link,
    }
}

fn player_line(player: &EnrichedPlayer) -> String {
    match &player.stats {
        Some(s) => format!("{} `{}/{}`", player_mention(player), s.kills, s.deaths),
        None => format!("{} `?/?`", player_mention(player)),
    }
}

/// Most MVPs, then most kills. Needs stats on both sides.
pub fn find_mvp(m: &EnrichedMatch) -> Option<&EnrichedPlayer> {
    let has_stats = |players: &[EnrichedPlayer]| players.iter().any(|p| p.stats.is_some());
    if !has_stats(&m.own_team.players) || !has_stats(&m.enemy_team.players) {
        return None;
    }
    m.players()
        .filter_map(|p| p.stats.as_ref().map(|s| (p, s)))
        .max_by_key(|(_, s)| (s.mvps, s.kills))
        .map(|(p, _)| p)
}

fn score_text(m: &EnrichedMatch) -> Option<String> {
    if m.own_team.score == 0 && m.enemy_team.score == 0 {
        None
    } else {
        Some(format!("{} - {}", m.own_team.score, m.enemy_team.score))
    }
}

/// Splits lines into field values that fit Discord's limit.
fn chunk_lines(lines: &[String]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + 1 + line.len() > FIELD_VALUE_LIMIT {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn push_chunked(fields: &mut Vec<EmbedField>, name: &str, lines: &[String]) {
    for (i, chunk) in chunk_lines(lines).into_iter().enumerate() {
        let name = if i == 0 { name } else { "\u{200b}" };
        fields.push(EmbedField::new(name, chunk, false));
    }
}

pub fn match_header(m: &EnrichedMatch) -> String {
    let names: Vec<String> = m.headline_players().into_iter().map(player_name).collect();
    let subject = if names.is_empty() { "Someone".to_string() } else { join_names(&names) };
    format!("{} {} {}", outcome_emoji(m.outcome), subject, outcome_phrase(m.outcome))
}

pub fn match_message(m: &EnrichedMatch) -> WebhookMessage {
    let mut fields = vec![EmbedField::new("Mode", m.game_mode.to_string(), true)];
    if let Some(score) = score_text(m) {
        fields.push(EmbedField::new("Score", score, true));
    }
    if !m.map_name.is_empty() {
        fields.push(EmbedField::new("Map", m.map_name.clone(), true));
    }
    if let Some(mvp) = find_mvp(m) {
        fields.push(EmbedField::new("MVP", player_line(mvp), false));
    }

    let own: Vec<String> = m.own_team.players.iter().map(player_line).collect();
    push_chunked(&mut fields, "Team", &own);
    let enemy: Vec<String> = m.enemy_team.players.iter().map(player_line).collect();
    push_chunked(&mut fields, "Opponents", &enemy);

    fields.push(EmbedField::new(
        "Details",
        format!("[Leetify]({})", match_link(&m.game_id)),
        false,
    ));

    WebhookMessage {
        content: match_header(m),
        embeds: vec![Embed {
            title: "Match details".to_string(),
            color: outcome_color(m.outcome),
            fields,
        }],
        username: Some(WEBHOOK_USERNAME.to_string()),
        ..Default::default()
    }
}

fn session_line(m: &EnrichedMatch) -> String {
    let mut parts = vec![outcome_emoji(m.outcome).to_string(), m.game_mode.to_string()];
    if let Some(score) = score_text(m) {
        parts.push(score);
    }
    if !m.map_name.is_empty() {
        parts.push(m.map_name.clone());
    }
    parts.push(format!("[details]({})", match_link(&m.game_id)));
    parts.join(" ")
}

fn teammate_line(t: &TeammateTotals) -> String {
    format!("{} {} kills / {} deaths", player_mention(&t.player), t.kills, t.deaths)
}

pub fn session_header(s: &EnrichedSession) -> String {
    let names: Vec<String> = s.known_players().into_iter().map(player_name).collect();
    let subject = if names.is_empty() { "Someone".to_string() } else { join_names(&names) };
    format!(":video_game: {} played {} matches.", subject, s.matches.len())
}

pub fn session_message(s: &EnrichedSession) -> WebhookMessage {
    let mut fields = Vec::new();
    let lines: Vec<String> = s.matches.iter().map(session_line).collect();
    push_chunked(&mut fields, "Matches", &lines);

    let best = s.best_teammate();
    let worst = s.worst_teammate();
    if let Some(best) = &best {
        fields.push(EmbedField::new("Best teammate", teammate_line(best), false));
    }
    // Only one teammate with stats: best and worst are the same player.
    if let (Some(best), Some(worst)) = (&best, &worst) {
        if best.player.steam_id != worst.player.steam_id {
            fields.push(EmbedField::new("Worst teammate", teammate_line(worst), false));
        }
    }

    WebhookMessage {
        content: session_header(s),
        embeds: vec![Embed {
            title: "Session summary".to_string(),
            color: COLOR_SESSION,
            fields,
        }],
        username: Some(WEBHOOK_USERNAME.to_string()),
        ..Default::default()
    }
}
