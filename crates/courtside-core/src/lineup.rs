// Lineup: a fixed-length ordered set of slots and the accounting around it.

use serde::{Deserialize, Serialize};

use crate::eligibility;
use crate::error::LineupError;
use crate::player::{Player, PlayerId};
use crate::position::Position;
use crate::template::RosterTemplate;

/// A player placed in a lineup slot.
///
/// Salary and projection are copied at assignment time, so lineup totals
/// never change underneath a session when the source data is refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosteredPlayer {
    pub id: PlayerId,
    pub name: String,
    pub salary: u32,
    pub proj_points: f64,
    pub positions: Vec<Position>,
}

impl From<&Player> for RosteredPlayer {
    fn from(p: &Player) -> Self {
        RosteredPlayer {
            id: p.id,
            name: p.name.clone(),
            salary: p.salary,
            proj_points: p.proj_points,
            positions: p.positions.clone(),
        }
    }
}

/// A single slot in a lineup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// The position label this slot requires.
    pub label: Position,
    /// The player occupying this slot, if any.
    pub occupant: Option<RosteredPlayer>,
}

impl Slot {
    pub fn occupant_id(&self) -> Option<PlayerId> {
        self.occupant.as_ref().map(|p| p.id)
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Salary and projection totals after a mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineupTotals {
    pub spent: u32,
    pub projected: f64,
}

/// One lineup for one roster template.
///
/// Invariants, held after every successful mutation:
/// - a player id occupies at most one slot;
/// - total salary never exceeds the salary cap;
/// - every occupant is eligible for its slot label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    slots: Vec<Slot>,
    salary_cap: u32,
}

impl Lineup {
    /// An empty lineup with one slot per template label.
    pub fn new(template: &RosterTemplate) -> Self {
        Lineup {
            slots: template
                .slots()
                .iter()
                .map(|&label| Slot {
                    label,
                    occupant: None,
                })
                .collect(),
            salary_cap: template.salary_cap(),
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn salary_cap(&self) -> u32 {
        self.salary_cap
    }

    pub fn roster_size(&self) -> usize {
        self.slots.len()
    }

    /// Place `player` in slot `index`.
    ///
    /// Checks run in order: slot availability, duplicate membership,
    /// eligibility, then salary cap. Nothing is changed on error.
    pub fn assign(&mut self, index: usize, player: &Player) -> Result<LineupTotals, LineupError> {
        self.place(index, RosteredPlayer::from(player))
    }

    /// Rebuild this lineup on an empty lineup for `template`, replaying every
    /// occupant through the same checks as [`assign`](Self::assign).
    ///
    /// Occupants keep their recorded salary and projection. An occupant past
    /// the end of the template fails with `SlotOutOfRange`; one whose slot
    /// label changed fails the eligibility check.
    pub fn revalidate(&self, template: &RosterTemplate) -> Result<Lineup, LineupError> {
        let mut rebuilt = Lineup::new(template);
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(occupant) = &slot.occupant {
                rebuilt.place(index, occupant.clone())?;
            }
        }
        Ok(rebuilt)
    }

    fn place(&mut self, index: usize, player: RosteredPlayer) -> Result<LineupTotals, LineupError> {
        let size = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(LineupError::SlotOutOfRange { index, size })?;

        if !slot.is_empty() {
            return Err(LineupError::SlotOccupied { index });
        }
        if self.is_member(player.id) {
            return Err(LineupError::AlreadyInLineup {
                name: player.name.clone(),
            });
        }
        if !eligibility::matches(&player.positions, slot.label) {
            return Err(LineupError::IneligibleForSlot {
                name: player.name.clone(),
                slot: slot.label,
            });
        }
        self.check_budget(player.salary)?;

        self.slots[index].occupant = Some(player);
        Ok(self.totals())
    }

    /// Free slot `index`, returning its previous occupant. Empty or
    /// out-of-range slots are a no-op.
    pub fn unassign(&mut self, index: usize) -> Option<RosteredPlayer> {
        self.slots.get_mut(index).and_then(|s| s.occupant.take())
    }

    /// Empty every slot, keeping the labels.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.occupant = None;
        }
    }

    /// Fail with `Budget` if adding `salary` would push the lineup over the cap.
    pub fn check_budget(&self, salary: u32) -> Result<(), LineupError> {
        let attempted = u64::from(self.spent()) + u64::from(salary);
        if attempted > u64::from(self.salary_cap) {
            return Err(LineupError::Budget {
                attempted,
                cap: self.salary_cap,
            });
        }
        Ok(())
    }

    /// The first empty slot, in template order, that accepts these positions.
    pub fn first_open_slot_for(&self, positions: &[Position]) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_empty() && eligibility::matches(positions, s.label))
    }

    pub fn is_member(&self, id: PlayerId) -> bool {
        self.slots.iter().any(|s| s.occupant_id() == Some(id))
    }

    pub fn spent(&self) -> u32 {
        self.occupants().map(|p| p.salary).sum()
    }

    pub fn projected(&self) -> f64 {
        self.occupants().map(|p| p.proj_points).sum()
    }

    pub fn totals(&self) -> LineupTotals {
        LineupTotals {
            spent: self.spent(),
            projected: self.projected(),
        }
    }

    pub fn remaining_budget(&self) -> u32 {
        self.salary_cap.saturating_sub(self.spent())
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn open_count(&self) -> usize {
        self.slots.len() - self.filled_count()
    }

    pub fn is_full(&self) -> bool {
        self.filled_count() == self.slots.len()
    }

    /// Average salary left per open slot; zero once the lineup is full.
    pub fn avg_remaining_per_slot(&self) -> f64 {
        match self.open_count() {
            0 => 0.0,
            open => f64::from(self.remaining_budget()) / open as f64,
        }
    }

    /// Occupant ids in slot order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.slots.iter().filter_map(|s| s.occupant_id()).collect()
    }

    /// Sorted occupant ids, used to detect duplicate lineups in a batch.
    pub fn signature(&self) -> Vec<PlayerId> {
        let mut ids = self.player_ids();
        ids.sort_unstable();
        ids
    }

    /// Display names in slot order, with an empty string for open slots.
    pub fn export_row(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|s| s.occupant.as_ref().map(|p| p.name.clone()).unwrap_or_default())
            .collect()
    }

    fn occupants(&self) -> impl Iterator<Item = &RosteredPlayer> {
        self.slots.iter().filter_map(|s| s.occupant.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Platform;
    use Position::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn player(id: u32, salary: u32, points: f64, positions: Vec<Position>) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("Player {id}"),
            team: "LAL".to_string(),
            salary,
            proj_points: points,
            positions,
            platform: Platform::DraftKings,
            plays_today: true,
        }
    }

    fn five_slot() -> RosterTemplate {
        RosterTemplate::new(
            vec![PointGuard, ShootingGuard, SmallForward, PowerForward, Center],
            50_000,
        )
    }

    #[test]
    fn new_lineup_is_empty() {
        let lineup = Lineup::new(&five_slot());
        assert_eq!(lineup.roster_size(), 5);
        assert_eq!(lineup.filled_count(), 0);
        assert_eq!(lineup.spent(), 0);
        assert!(!lineup.is_full());
        assert_eq!(lineup.export_row(), vec![""; 5]);
    }

    #[test]
    fn assign_returns_running_totals() {
        let mut lineup = Lineup::new(&five_slot());
        let totals = lineup.assign(0, &player(1, 12_000, 45.5, vec![PointGuard])).unwrap();
        assert_eq!(totals.spent, 12_000);
        assert!(approx_eq(totals.projected, 45.5, 1e-9));

        let totals = lineup.assign(4, &player(2, 8_000, 30.0, vec![Center])).unwrap();
        assert_eq!(totals.spent, 20_000);
        assert!(approx_eq(totals.projected, 75.5, 1e-9));
    }

    #[test]
    fn assign_rejects_occupied_slot() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 5_000, 20.0, vec![PointGuard])).unwrap();
        let err = lineup.assign(0, &player(2, 5_000, 20.0, vec![PointGuard])).unwrap_err();
        assert_eq!(err, LineupError::SlotOccupied { index: 0 });
    }

    #[test]
    fn assign_rejects_out_of_range() {
        let mut lineup = Lineup::new(&five_slot());
        let err = lineup.assign(9, &player(1, 5_000, 20.0, vec![PointGuard])).unwrap_err();
        assert_eq!(err, LineupError::SlotOutOfRange { index: 9, size: 5 });
    }

    #[test]
    fn assign_rejects_duplicate_player() {
        let mut lineup = Lineup::new(&five_slot());
        let p = player(1, 5_000, 20.0, vec![PointGuard, ShootingGuard]);
        lineup.assign(0, &p).unwrap();
        let err = lineup.assign(1, &p).unwrap_err();
        assert!(matches!(err, LineupError::AlreadyInLineup { .. }));
        assert_eq!(lineup.filled_count(), 1);
    }

    #[test]
    fn assign_rejects_ineligible_player() {
        let mut lineup = Lineup::new(&five_slot());
        let err = lineup.assign(4, &player(1, 5_000, 20.0, vec![PointGuard])).unwrap_err();
        assert!(matches!(err, LineupError::IneligibleForSlot { slot: Center, .. }));
        assert!(lineup.slots()[4].is_empty());
    }

    #[test]
    fn assign_rejects_over_cap_and_leaves_lineup_unchanged() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 30_000, 50.0, vec![PointGuard])).unwrap();
        let err = lineup.assign(1, &player(2, 20_001, 40.0, vec![ShootingGuard])).unwrap_err();
        assert_eq!(
            err,
            LineupError::Budget {
                attempted: 50_001,
                cap: 50_000
            }
        );
        assert_eq!(lineup.spent(), 30_000);
        assert!(lineup.slots()[1].is_empty());
    }

    #[test]
    fn assign_exactly_at_cap_is_allowed() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 30_000, 50.0, vec![PointGuard])).unwrap();
        lineup.assign(1, &player(2, 20_000, 40.0, vec![ShootingGuard])).unwrap();
        assert_eq!(lineup.spent(), 50_000);
        assert_eq!(lineup.remaining_budget(), 0);
    }

    #[test]
    fn unassign_is_noop_on_empty_slot() {
        let mut lineup = Lineup::new(&five_slot());
        assert!(lineup.unassign(2).is_none());
        assert!(lineup.unassign(99).is_none());
        lineup.assign(2, &player(1, 5_000, 20.0, vec![SmallForward])).unwrap();
        assert_eq!(lineup.unassign(2).map(|p| p.id), Some(PlayerId(1)));
        assert!(lineup.slots()[2].is_empty());
    }

    #[test]
    fn full_lineup_and_signature() {
        let mut lineup = Lineup::new(&five_slot());
        let positions = [PointGuard, ShootingGuard, SmallForward, PowerForward, Center];
        for (i, pos) in positions.iter().enumerate() {
            lineup
                .assign(i, &player(10 - i as u32, 5_000, 20.0, vec![*pos]))
                .unwrap();
        }
        assert!(lineup.is_full());
        assert_eq!(lineup.open_count(), 0);
        assert_eq!(
            lineup.signature(),
            vec![PlayerId(6), PlayerId(7), PlayerId(8), PlayerId(9), PlayerId(10)]
        );
        assert_eq!(
            lineup.player_ids(),
            vec![PlayerId(10), PlayerId(9), PlayerId(8), PlayerId(7), PlayerId(6)]
        );
        assert!(approx_eq(lineup.avg_remaining_per_slot(), 0.0, 1e-9));
    }

    #[test]
    fn export_row_uses_names_and_blanks() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(1, &player(3, 5_000, 20.0, vec![ShootingGuard])).unwrap();
        assert_eq!(lineup.export_row(), vec!["", "Player 3", "", "", ""]);
    }

    #[test]
    fn avg_remaining_per_slot_divides_over_open_slots() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 10_000, 20.0, vec![PointGuard])).unwrap();
        assert!(approx_eq(lineup.avg_remaining_per_slot(), 10_000.0, 1e-9));
    }

    #[test]
    fn first_open_slot_follows_template_order() {
        let template = Platform::DraftKings.default_template();
        let mut lineup = Lineup::new(&template);
        assert_eq!(lineup.first_open_slot_for(&[ShootingGuard]), Some(1));
        lineup.assign(1, &player(1, 5_000, 20.0, vec![ShootingGuard])).unwrap();
        assert_eq!(lineup.first_open_slot_for(&[ShootingGuard]), Some(5));
        assert_eq!(lineup.first_open_slot_for(&[Center, PowerForward]), Some(3));
    }

    #[test]
    fn revalidate_keeps_a_valid_lineup() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 12_000, 45.5, vec![PointGuard])).unwrap();
        lineup.assign(4, &player(2, 8_000, 30.0, vec![Center])).unwrap();
        assert_eq!(lineup.revalidate(&five_slot()).unwrap(), lineup);
    }

    #[test]
    fn revalidate_rejects_tampered_occupants() {
        let guard = RosteredPlayer::from(&player(1, 30_000, 45.5, vec![PointGuard]));

        // Same player twice.
        let mut twice = Lineup::new(&five_slot());
        twice.slots[0].occupant = Some(guard.clone());
        twice.slots[1].occupant = Some(guard.clone());
        assert!(matches!(
            twice.revalidate(&five_slot()),
            Err(LineupError::AlreadyInLineup { .. })
        ));

        // A point guard sitting in the center slot.
        let mut misplaced = Lineup::new(&five_slot());
        misplaced.slots[4].occupant = Some(guard.clone());
        assert!(matches!(
            misplaced.revalidate(&five_slot()),
            Err(LineupError::IneligibleForSlot { slot: Center, .. })
        ));

        // Over the cap once both are counted.
        let mut over = Lineup::new(&five_slot());
        over.slots[0].occupant = Some(guard);
        over.slots[4].occupant =
            Some(RosteredPlayer::from(&player(2, 25_000, 30.0, vec![Center])));
        assert!(matches!(
            over.revalidate(&five_slot()),
            Err(LineupError::Budget { attempted: 55_000, cap: 50_000 })
        ));
    }

    #[test]
    fn revalidate_against_a_shorter_template() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(4, &player(2, 8_000, 30.0, vec![Center])).unwrap();
        let short = RosterTemplate::new(vec![PointGuard, ShootingGuard], 50_000);
        assert!(matches!(
            lineup.revalidate(&short),
            Err(LineupError::SlotOutOfRange { index: 4, size: 2 })
        ));
    }

    #[test]
    fn clear_keeps_labels() {
        let mut lineup = Lineup::new(&five_slot());
        lineup.assign(0, &player(1, 5_000, 20.0, vec![PointGuard])).unwrap();
        lineup.clear();
        assert_eq!(lineup.filled_count(), 0);
        assert_eq!(lineup.slots()[4].label, Center);
    }
}
