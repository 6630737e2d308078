// Player records and the read-only candidate pool.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::eligibility;
use crate::position::Position;
use crate::template::Platform;

/// Platform-assigned player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player available on one platform's slate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name ("First Last"), used in exported rows.
    pub name: String,
    pub team: String,
    pub salary: u32,
    pub proj_points: f64,
    /// Eligible positions, e.g. `[PG, SG]` for a "PG/SG" listing.
    pub positions: Vec<Position>,
    pub platform: Platform,
    pub plays_today: bool,
}

impl Player {
    /// Whether this player may occupy a slot with the given label.
    pub fn eligible_for(&self, slot: Position) -> bool {
        eligibility::matches(&self.positions, slot)
    }

    /// Positions joined with "/", as the platforms list them.
    pub fn position_str(&self) -> String {
        self.positions
            .iter()
            .map(|p| p.display_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// An immutable snapshot of the players considered for one builder session
/// or optimizer run, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
}

impl PlayerPool {
    /// Build a pool. If an id appears more than once the first record wins.
    pub fn new(players: Vec<Player>) -> Self {
        let mut kept = Vec::with_capacity(players.len());
        let mut index = HashMap::with_capacity(players.len());
        for player in players {
            if index.contains_key(&player.id) {
                warn!("duplicate player id {} ({}), keeping first record", player.id, player.name);
                continue;
            }
            index.insert(player.id, kept.len());
            kept.push(player);
        }
        PlayerPool { players: kept, index }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|&i| &self.players[i])
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, name: &str) -> Player {
        Player {
            id: PlayerId(id),
            name: name.to_string(),
            team: "BOS".to_string(),
            salary: 5000,
            proj_points: 20.0,
            positions: vec![Position::PointGuard, Position::ShootingGuard],
            platform: Platform::DraftKings,
            plays_today: true,
        }
    }

    #[test]
    fn pool_lookup_by_id() {
        let pool = PlayerPool::new(vec![player(1, "A"), player(2, "B")]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(PlayerId(2)).map(|p| p.name.as_str()), Some("B"));
        assert!(pool.get(PlayerId(3)).is_none());
        assert!(pool.contains(PlayerId(1)));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let pool = PlayerPool::new(vec![player(1, "First"), player(1, "Second")]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(PlayerId(1)).unwrap().name, "First");
    }

    #[test]
    fn position_str_joins_with_slash() {
        assert_eq!(player(1, "A").position_str(), "PG/SG");
    }

    #[test]
    fn eligible_for_uses_flex_groups() {
        let p = player(1, "A");
        assert!(p.eligible_for(Position::Guard));
        assert!(p.eligible_for(Position::Utility));
        assert!(!p.eligible_for(Position::Forward));
    }
}
