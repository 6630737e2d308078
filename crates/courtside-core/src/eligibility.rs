// Slot eligibility: may a player with these positions occupy this slot?

use crate::position::Position;

/// Decide whether a player listed at `player_positions` may fill a slot
/// labelled `slot`.
///
/// A primary slot requires that exact position. A flexible slot (`G`, `F`,
/// `UTIL`) accepts any player whose positions intersect its group.
pub fn matches(player_positions: &[Position], slot: Position) -> bool {
    let accepted = slot.accepts();
    player_positions.iter().any(|p| accepted.contains(p))
}
