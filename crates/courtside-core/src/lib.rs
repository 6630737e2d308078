// Library root: the lineup construction and optimization engine.
//
// Everything in this crate is synchronous and free of I/O beyond the CSV
// writer in `export`. Session handling, pool loading and persistence live in
// `courtside-app`.

pub mod builder;
pub mod eligibility;
pub mod error;
pub mod export;
pub mod lineup;
pub mod optimizer;
pub mod player;
pub mod position;
pub mod ranking;
pub mod template;

pub use builder::{clear_all_lineups, LineupBuilder};
pub use error::{ErrorKind, LineupError, OptimizeError};
pub use lineup::{Lineup, LineupTotals, RosteredPlayer, Slot};
pub use optimizer::{Batch, BatchRequest, OptimizerSettings, SearchBudget};
pub use player::{Player, PlayerId, PlayerPool};
pub use position::Position;
pub use ranking::{rank_by, RankOrder, Ranked};
pub use template::{Platform, RosterTemplate};
