// Interactive lineup building: one validated add/remove/clear at a time.

use tracing::debug;

use crate::error::LineupError;
use crate::lineup::Lineup;
use crate::player::{PlayerId, PlayerPool};

/// Applies single-player edits to a lineup, resolving ids against a pool
/// snapshot.
///
/// The builder holds no lineup itself: callers pass the lineup they own for
/// each call and are responsible for serializing mutations of one lineup.
#[derive(Debug, Clone, Copy)]
pub struct LineupBuilder<'a> {
    pool: &'a PlayerPool,
}

impl<'a> LineupBuilder<'a> {
    pub fn new(pool: &'a PlayerPool) -> Self {
        LineupBuilder { pool }
    }

    pub fn pool(&self) -> &'a PlayerPool {
        self.pool
    }

    /// Add a player to the first open slot that accepts them.
    ///
    /// Order of checks:
    /// 1. The id must resolve in the pool.
    /// 2. The player must not already be in the lineup.
    /// 3. Committed salary plus the new salary must fit under the cap. This
    ///    runs before any slot search.
    /// 4. Slots are searched in template order, so earlier primary slots win
    ///    over later flex slots.
    ///
    /// Returns the index of the slot that was filled.
    pub fn add_player(&self, lineup: &mut Lineup, id: PlayerId) -> Result<usize, LineupError> {
        let player = self.pool.get(id).ok_or(LineupError::UnknownPlayer(id))?;

        if lineup.is_member(id) {
            return Err(LineupError::AlreadyInLineup {
                name: player.name.clone(),
            });
        }
        lineup.check_budget(player.salary)?;

        let index = lineup
            .first_open_slot_for(&player.positions)
            .ok_or_else(|| LineupError::NoOpenSlot {
                name: player.name.clone(),
            })?;

        lineup.assign(index, player)?;
        debug!(
            "added {} ({}) to slot {} [{}]",
            player.name,
            id,
            index,
            lineup.slots()[index].label
        );
        Ok(index)
    }

    /// Remove every occurrence of `id`. Returns how many slots were freed,
    /// which is zero when the player was not in the lineup.
    pub fn remove_player(&self, lineup: &mut Lineup, id: PlayerId) -> usize {
        remove_player(lineup, id)
    }

    /// Empty the lineup, keeping its template.
    pub fn clear(&self, lineup: &mut Lineup) {
        lineup.clear();
    }
}

/// Free every slot holding `id`. Needs no pool lookup.
pub fn remove_player(lineup: &mut Lineup, id: PlayerId) -> usize {
    let indices: Vec<usize> = lineup
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.occupant_id() == Some(id))
        .map(|(i, _)| i)
        .collect();
    for &i in &indices {
        lineup.unassign(i);
    }
    indices.len()
}

/// Wipe a set of interactive lineups down to a single empty one.
///
/// Lineup #1 is kept (emptied) so its template survives; the rest are
/// discarded. An empty set is left empty.
pub fn clear_all_lineups(lineups: &mut Vec<Lineup>) {
    lineups.truncate(1);
    if let Some(first) = lineups.first_mut() {
        first.clear();
    }
}
