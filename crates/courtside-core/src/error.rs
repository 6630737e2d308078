// Error types for lineup mutations and batch optimization.

use thiserror::Error;

use crate::player::PlayerId;
use crate::position::Position;

/// The coarse error category, for callers that branch on the kind of failure
/// rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownPlayer,
    Budget,
    Eligibility,
    Capacity,
    InvalidRequest,
    Infeasible,
}

/// A rejected lineup mutation. The lineup is unchanged whenever one of these
/// is returned; the `Display` text is the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineupError {
    #[error("player {0} is not in the player pool")]
    UnknownPlayer(PlayerId),

    #[error("lineup salary exceeds the salary cap ({attempted} > {cap})")]
    Budget { attempted: u64, cap: u32 },

    #[error("{name} is not eligible for the {slot} slot")]
    IneligibleForSlot { name: String, slot: Position },

    #[error("{name} is not applicable to any position")]
    NoOpenSlot { name: String },

    #[error("slot {index} is already occupied")]
    SlotOccupied { index: usize },

    #[error("slot {index} does not exist in a {size}-slot roster")]
    SlotOutOfRange { index: usize, size: usize },

    #[error("{name} is already in the lineup")]
    AlreadyInLineup { name: String },
}

impl LineupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LineupError::UnknownPlayer(_) => ErrorKind::UnknownPlayer,
            LineupError::Budget { .. } => ErrorKind::Budget,
            LineupError::IneligibleForSlot { .. } | LineupError::NoOpenSlot { .. } => {
                ErrorKind::Eligibility
            }
            LineupError::SlotOccupied { .. }
            | LineupError::SlotOutOfRange { .. }
            | LineupError::AlreadyInLineup { .. } => ErrorKind::Capacity,
        }
    }
}

/// A failed batch request. No lineups are produced when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("infeasible: {0}")]
    Infeasible(String),
}

impl OptimizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OptimizeError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            OptimizeError::Infeasible(_) => ErrorKind::Infeasible,
        }
    }
}
