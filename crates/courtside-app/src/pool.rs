// Player pool loading: slate CSV parsing and per-platform filtering.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use courtside_core::{Platform, Player, PlayerId, PlayerPool, Position};
use serde::Deserialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV row (private)
// ---------------------------------------------------------------------------

/// One row of the slate export. Salary is read as text because some sources
/// format it with thousands separators ("6,500").
#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: u32,
    first_name: String,
    last_name: String,
    team: String,
    salary: String,
    proj_points: f64,
    actual_position: String,
    data_source: String,
    #[serde(default)]
    play_today: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// "J.J. Redick" is listed as "JJ Redick" on every platform upload.
fn display_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim())
        .replace('.', "")
        .trim()
        .to_string()
}

fn parse_salary(raw: &str) -> Option<u32> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, ',' | '$' | ' ')).collect();
    cleaned.parse().ok()
}

/// A missing or empty flag means the player is on today's slate.
fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|s| s.trim().to_lowercase()) {
        None => Some(true),
        Some(s) if s.is_empty() => Some(true),
        Some(s) => match s.as_str() {
            "true" | "t" | "1" | "yes" | "y" => Some(true),
            "false" | "f" | "0" | "no" | "n" => Some(false),
            _ => None,
        },
    }
}

fn convert(raw: RawPlayer) -> Option<Player> {
    let name = display_name(&raw.first_name, &raw.last_name);

    let Some(platform) = Platform::from_name(&raw.data_source) else {
        warn!("skipping player '{}': unknown data_source '{}'", name, raw.data_source);
        return None;
    };
    let Some(salary) = parse_salary(&raw.salary) else {
        warn!("skipping player '{}': invalid salary '{}'", name, raw.salary);
        return None;
    };
    if !raw.proj_points.is_finite() {
        warn!("skipping player '{}': non-finite projection", name);
        return None;
    }
    let Some(plays_today) = parse_flag(raw.play_today.as_deref()) else {
        warn!(
            "skipping player '{}': invalid play_today '{}'",
            name,
            raw.play_today.as_deref().unwrap_or_default()
        );
        return None;
    };

    // Every listed label must be known; "PG/XX" is rejected rather than
    // silently narrowed to PG.
    let labels: Vec<&str> = raw
        .actual_position
        .split(['/', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let positions = Position::parse_list(&raw.actual_position);
    if labels.is_empty() || labels.iter().any(|l| Position::from_str_pos(l).is_none()) {
        warn!(
            "skipping player '{}': unknown position '{}'",
            name, raw.actual_position
        );
        return None;
    }

    Some(Player {
        id: PlayerId(raw.id),
        name,
        team: raw.team.trim().to_uppercase(),
        salary,
        proj_points: raw.proj_points,
        positions,
        platform,
        plays_today,
    })
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawPlayer>() {
        match result {
            Ok(raw) => {
                if let Some(player) = convert(raw) {
                    players.push(player);
                }
            }
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
            }
        }
    }
    Ok(players)
}

/// Load every player record from a slate CSV. Rows that cannot be used are
/// skipped with a warning; only an unreadable file is an error.
pub fn load_players(path: &Path) -> Result<Vec<Player>, PoolError> {
    let file = std::fs::File::open(path).map_err(|e| PoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_players_from_reader(file).map_err(|e| PoolError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("loaded {} players from {}", players.len(), path.display());
    Ok(players)
}

/// Split a game selection such as `"BOS-NYK;LAL-GSW"` into team codes.
pub fn parse_games(games: &str) -> Vec<String> {
    games
        .split([';', '-', ','])
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// The candidate pool for `platform`: players on today's slate, restricted
/// to `teams` when any are given, best projection first.
pub fn eligible_pool(players: &[Player], platform: Platform, teams: &[String]) -> PlayerPool {
    let teams: HashSet<String> = teams.iter().map(|t| t.trim().to_uppercase()).collect();

    let mut selected: Vec<Player> = players
        .iter()
        .filter(|p| p.platform == platform && p.plays_today)
        .filter(|p| teams.is_empty() || teams.contains(&p.team))
        .cloned()
        .collect();
    // NaN projections sort last.
    let points = |p: &Player| if p.proj_points.is_nan() { f64::NEG_INFINITY } else { p.proj_points };
    selected.sort_by(|a, b| points(b).total_cmp(&points(a)));

    PlayerPool::new(selected)
}
