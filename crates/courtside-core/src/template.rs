// Roster templates: the slot layout and salary cap for each platform.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::Position;

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

/// A daily fantasy platform (the `data_source` of a player record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    FanDuel,
    DraftKings,
    Yahoo,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::FanDuel, Platform::DraftKings, Platform::Yahoo];

    /// Parse a platform name, ignoring case ("draftkings", "FanDuel", ...).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fanduel" | "fd" => Some(Platform::FanDuel),
            "draftkings" | "dk" => Some(Platform::DraftKings),
            "yahoo" => Some(Platform::Yahoo),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::FanDuel => "FanDuel",
            Platform::DraftKings => "DraftKings",
            Platform::Yahoo => "Yahoo",
        }
    }

    /// The platform's standard NBA classic template.
    pub fn default_template(&self) -> RosterTemplate {
        use Position::*;
        match self {
            Platform::FanDuel => RosterTemplate::new(
                vec![
                    PointGuard,
                    PointGuard,
                    ShootingGuard,
                    ShootingGuard,
                    SmallForward,
                    SmallForward,
                    PowerForward,
                    PowerForward,
                    Center,
                ],
                60_000,
            ),
            Platform::DraftKings => RosterTemplate::new(
                vec![
                    PointGuard,
                    ShootingGuard,
                    SmallForward,
                    PowerForward,
                    Center,
                    Guard,
                    Forward,
                    Utility,
                ],
                50_000,
            ),
            Platform::Yahoo => RosterTemplate::new(
                vec![
                    PointGuard,
                    ShootingGuard,
                    Guard,
                    SmallForward,
                    PowerForward,
                    Forward,
                    Center,
                    Utility,
                ],
                200,
            ),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// RosterTemplate
// ---------------------------------------------------------------------------

/// Ordered slot labels plus the salary cap. Immutable once built: lineups
/// copy the labels they need, so a template can be shared freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterTemplate {
    slots: Vec<Position>,
    salary_cap: u32,
}

impl RosterTemplate {
    pub fn new(slots: Vec<Position>, salary_cap: u32) -> Self {
        RosterTemplate { slots, salary_cap }
    }

    /// Build a template from slot label strings, e.g. `["PG", "SG", "UTIL"]`.
    /// Returns `None` if any label is unknown.
    pub fn from_labels<S: AsRef<str>>(labels: &[S], salary_cap: u32) -> Option<Self> {
        let slots = labels
            .iter()
            .map(|l| Position::from_str_pos(l.as_ref()))
            .collect::<Option<Vec<_>>>()?;
        Some(RosterTemplate::new(slots, salary_cap))
    }

    pub fn slots(&self) -> &[Position] {
        &self.slots
    }

    pub fn roster_size(&self) -> usize {
        self.slots.len()
    }

    pub fn salary_cap(&self) -> u32 {
        self.salary_cap
    }

    /// Slot labels as strings, in template order. This is the CSV header.
    pub fn labels(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.display_str()).collect()
    }
}
