// Basketball positions and the flexible slot labels built on top of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position label. The first five variants are primary positions a player
/// can be listed at; `Guard`, `Forward` and `Utility` are flexible slot labels
/// that accept a group of primary positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
    Guard,
    Forward,
    Utility,
}

/// The primary positions, in display order.
pub const PRIMARY_POSITIONS: [Position; 5] = [
    Position::PointGuard,
    Position::ShootingGuard,
    Position::SmallForward,
    Position::PowerForward,
    Position::Center,
];

impl Position {
    /// Parse a position label such as "PG", "F" or "UTIL".
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PG" => Some(Position::PointGuard),
            "SG" => Some(Position::ShootingGuard),
            "SF" => Some(Position::SmallForward),
            "PF" => Some(Position::PowerForward),
            "C" => Some(Position::Center),
            "G" => Some(Position::Guard),
            "F" => Some(Position::Forward),
            "UTIL" | "UT" => Some(Position::Utility),
            _ => None,
        }
    }

    /// Parse a combined eligibility string like "PG/SG".
    ///
    /// Unknown labels are dropped; duplicates collapse. The result keeps the
    /// order in which labels first appear.
    pub fn parse_list(s: &str) -> Vec<Position> {
        let mut positions = Vec::new();
        for label in s.split(['/', ',']) {
            if let Some(pos) = Position::from_str_pos(label) {
                if !positions.contains(&pos) {
                    positions.push(pos);
                }
            }
        }
        positions
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::PointGuard => "PG",
            Position::ShootingGuard => "SG",
            Position::SmallForward => "SF",
            Position::PowerForward => "PF",
            Position::Center => "C",
            Position::Guard => "G",
            Position::Forward => "F",
            Position::Utility => "UTIL",
        }
    }

    /// Whether this is a flexible slot label rather than a primary position.
    pub fn is_flex(&self) -> bool {
        matches!(self, Position::Guard | Position::Forward | Position::Utility)
    }

    /// Every label a player may carry to be accepted by a slot with this label.
    ///
    /// A flexible label also accepts itself, so a player listed simply as "G"
    /// still fits a `G` slot.
    pub fn accepts(&self) -> &'static [Position] {
        match self {
            Position::PointGuard => &[Position::PointGuard],
            Position::ShootingGuard => &[Position::ShootingGuard],
            Position::SmallForward => &[Position::SmallForward],
            Position::PowerForward => &[Position::PowerForward],
            Position::Center => &[Position::Center],
            Position::Guard => &[Position::PointGuard, Position::ShootingGuard, Position::Guard],
            Position::Forward => &[Position::SmallForward, Position::PowerForward, Position::Forward],
            Position::Utility => &[
                Position::PointGuard,
                Position::ShootingGuard,
                Position::SmallForward,
                Position::PowerForward,
                Position::Center,
                Position::Guard,
                Position::Forward,
                Position::Utility,
            ],
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}
