// Batch lineup optimizer.
//
// Produces N lineups that share a locked core and otherwise maximize
// projected points heuristically:
// 1. Validate the request and seed the locked players.
// 2. Fill each lineup most-constrained-slot first, backtracking through an
//    explicit choice-point stack (see `search`).
// 3. Reject lineups whose signature was already produced in this batch and
//    retry with a fresh random draw and one colliding player excluded.
//
// Lineups can be built on one thread (fully reproducible for a seed) or on a
// scoped worker pool that shares only the signature set.

mod budget;
mod search;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::OptimizeError;
use crate::lineup::Lineup;
use crate::player::{Player, PlayerId, PlayerPool};
use crate::template::RosterTemplate;

pub use budget::SearchBudget;
use search::{FillOutcome, SearchContext};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Tunable knobs for the heuristic. None of them affect correctness: every
/// returned lineup satisfies the lineup invariants regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Base seed for tie-breaking and exploration.
    pub seed: u64,
    /// Backtracking steps allowed per fill attempt.
    pub max_backtracks: usize,
    /// Extra attempts per lineup after a signature collision.
    pub diversity_retries: usize,
    /// 0 ranks candidates by raw points, 1 by points per per-slot budget.
    pub value_weight: f64,
    /// Relative score noise for every lineup after the first, grown on each
    /// retry and capped at 1.
    pub exploration: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            seed: 42,
            max_backtracks: 2_000,
            diversity_retries: 25,
            value_weight: 0.5,
            exploration: 0.15,
        }
    }
}

/// How many lineups to build and which players every one must contain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchRequest {
    pub count: usize,
    pub locked: Vec<PlayerId>,
}

impl BatchRequest {
    pub fn new(count: usize) -> Self {
        BatchRequest {
            count,
            locked: Vec::new(),
        }
    }

    pub fn with_locked(mut self, locked: Vec<PlayerId>) -> Self {
        self.locked = locked;
        self
    }
}

/// The result of a batch run.
#[derive(Debug, Clone)]
pub struct Batch {
    pub lineups: Vec<Lineup>,
    pub requested: usize,
    /// Lineups accepted although their signature repeats an earlier one.
    pub duplicates: usize,
    /// Whether the search budget ended the run early.
    pub stopped: bool,
}

impl Batch {
    fn empty(requested: usize) -> Self {
        Batch {
            lineups: Vec::with_capacity(requested),
            requested,
            duplicates: 0,
            stopped: false,
        }
    }

    /// Lineups requested but not produced before the budget ran out.
    pub fn unproduced(&self) -> usize {
        self.requested.saturating_sub(self.lineups.len())
    }

    pub fn is_complete(&self) -> bool {
        self.unproduced() == 0
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Build a batch on the current thread with no time limit.
pub fn generate(
    pool: &PlayerPool,
    template: &RosterTemplate,
    request: &BatchRequest,
    settings: &OptimizerSettings,
) -> Result<Batch, OptimizeError> {
    generate_with_budget(pool, template, request, settings, &SearchBudget::unlimited())
}

/// Build a batch on the current thread, stopping when `budget` runs out.
///
/// A stopped batch is still `Ok`: it holds the lineups completed so far and
/// reports the shortfall through [`Batch::unproduced`].
pub fn generate_with_budget(
    pool: &PlayerPool,
    template: &RosterTemplate,
    request: &BatchRequest,
    settings: &OptimizerSettings,
    budget: &SearchBudget,
) -> Result<Batch, OptimizeError> {
    let locked = validate_request(pool, template, request)?;
    let seeded = search::seed_locked(template, &locked)?;
    let locked_ids: HashSet<PlayerId> = locked.iter().map(|p| p.id).collect();
    let ctx = SearchContext {
        pool,
        settings,
        budget,
        locked: &locked_ids,
    };

    info!(
        "generating {} lineups from {} players ({} locked)",
        request.count,
        pool.len(),
        locked_ids.len()
    );

    let signatures = SignatureSet::default();
    let mut batch = Batch::empty(request.count);
    let mut baseline: Option<Lineup> = None;

    for index in 0..request.count {
        if budget.is_stopped() {
            batch.stopped = true;
            break;
        }
        match build_lineup(&ctx, &seeded, index, &signatures, baseline.as_ref()) {
            LineupOutcome::Built { lineup, duplicate } => {
                if duplicate {
                    batch.duplicates += 1;
                }
                if baseline.is_none() {
                    baseline = Some(lineup.clone());
                }
                batch.lineups.push(lineup);
            }
            LineupOutcome::Stopped => {
                batch.stopped = true;
                break;
            }
            LineupOutcome::Exhausted => return Err(no_completion()),
        }
    }

    log_finished(&batch);
    Ok(batch)
}

/// Build a batch on `workers` scoped threads, one lineup per task.
///
/// Lineup #1 is built first on the calling thread: it proves the request is
/// feasible and is the fallback for any worker that cannot finish its own.
/// Results are returned in lineup order. Which retries collide depends on
/// thread timing, so only the single-threaded path is exactly reproducible.
pub fn generate_parallel(
    pool: &PlayerPool,
    template: &RosterTemplate,
    request: &BatchRequest,
    settings: &OptimizerSettings,
    budget: &SearchBudget,
    workers: usize,
) -> Result<Batch, OptimizeError> {
    if workers <= 1 || request.count <= 1 {
        return generate_with_budget(pool, template, request, settings, budget);
    }

    let locked = validate_request(pool, template, request)?;
    let seeded = search::seed_locked(template, &locked)?;
    let locked_ids: HashSet<PlayerId> = locked.iter().map(|p| p.id).collect();
    let ctx = SearchContext {
        pool,
        settings,
        budget,
        locked: &locked_ids,
    };

    info!(
        "generating {} lineups from {} players ({} locked) on {} workers",
        request.count,
        pool.len(),
        locked_ids.len(),
        workers
    );

    let signatures = SignatureSet::default();
    let mut batch = Batch::empty(request.count);

    let first = match build_lineup(&ctx, &seeded, 0, &signatures, None) {
        LineupOutcome::Built { lineup, .. } => lineup,
        LineupOutcome::Stopped => {
            batch.stopped = true;
            log_finished(&batch);
            return Ok(batch);
        }
        LineupOutcome::Exhausted => return Err(no_completion()),
    };

    let next_index = AtomicUsize::new(1);
    let stopped = AtomicBool::new(false);
    let produced: Mutex<Vec<(usize, Lineup, bool)>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..workers.min(request.count - 1) {
            scope.spawn(|| loop {
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                if index >= request.count {
                    break;
                }
                if budget.is_stopped() {
                    stopped.store(true, Ordering::Relaxed);
                    break;
                }
                match build_lineup(&ctx, &seeded, index, &signatures, Some(&first)) {
                    LineupOutcome::Built { lineup, duplicate } => produced
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, lineup, duplicate)),
                    LineupOutcome::Stopped => {
                        stopped.store(true, Ordering::Relaxed);
                        break;
                    }
                    // Unreachable with a baseline, which always completes.
                    LineupOutcome::Exhausted => {}
                }
            });
        }
    });

    let mut produced = produced.into_inner().unwrap_or_else(PoisonError::into_inner);
    produced.sort_by_key(|(index, _, _)| *index);

    batch.lineups.push(first);
    for (_, lineup, duplicate) in produced {
        if duplicate {
            batch.duplicates += 1;
        }
        batch.lineups.push(lineup);
    }
    batch.stopped = stopped.into_inner();

    log_finished(&batch);
    Ok(batch)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check the preconditions and resolve the locked players (deduplicated,
/// first occurrence kept).
fn validate_request<'p>(
    pool: &'p PlayerPool,
    template: &RosterTemplate,
    request: &BatchRequest,
) -> Result<Vec<&'p Player>, OptimizeError> {
    if request.count == 0 {
        return Err(OptimizeError::InvalidRequest(
            "lineup count must be at least 1".into(),
        ));
    }

    let mut seen = HashSet::new();
    let mut locked = Vec::new();
    for &id in &request.locked {
        if !seen.insert(id) {
            continue;
        }
        let player = pool.get(id).ok_or_else(|| {
            OptimizeError::InvalidRequest(format!("locked player {id} is not in the player pool"))
        })?;
        locked.push(player);
    }

    if locked.len() > template.roster_size() {
        return Err(OptimizeError::InvalidRequest(format!(
            "{} locked players exceed the roster size of {}",
            locked.len(),
            template.roster_size()
        )));
    }

    let locked_salary: u64 = locked.iter().map(|p| u64::from(p.salary)).sum();
    if locked_salary > u64::from(template.salary_cap()) {
        return Err(OptimizeError::InvalidRequest(format!(
            "locked salary {} exceeds the salary cap of {}",
            locked_salary,
            template.salary_cap()
        )));
    }

    Ok(locked)
}

fn no_completion() -> OptimizeError {
    OptimizeError::Infeasible(
        "no lineup can be completed around the locked players from this pool".into(),
    )
}

// ---------------------------------------------------------------------------
// Per-lineup driver
// ---------------------------------------------------------------------------

enum LineupOutcome {
    Built { lineup: Lineup, duplicate: bool },
    Exhausted,
    Stopped,
}

/// Signatures produced so far in a batch. Append-only.
#[derive(Default)]
struct SignatureSet {
    seen: Mutex<HashSet<Vec<PlayerId>>>,
}

impl SignatureSet {
    /// Record `signature`; returns `false` if it was already present.
    fn insert(&self, signature: Vec<PlayerId>) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature)
    }
}

/// Build lineup `index` of the batch.
///
/// Each attempt draws from a per-lineup RNG. After a collision one
/// non-locked member of the colliding lineup is excluded for the following
/// attempts; if the exclusions leave no completion they are dropped and the
/// attempt is repeated without them. When every attempt collides the last
/// lineup is accepted as a duplicate; when none completes, `baseline` (the
/// batch's first lineup) stands in.
fn build_lineup(
    ctx: &SearchContext<'_>,
    seeded: &Lineup,
    index: usize,
    signatures: &SignatureSet,
    baseline: Option<&Lineup>,
) -> LineupOutcome {
    let mut rng = StdRng::seed_from_u64(lineup_seed(ctx.settings.seed, index));
    let mut banned: HashSet<PlayerId> = HashSet::new();
    let mut last: Option<Lineup> = None;

    for attempt in 0..=ctx.settings.diversity_retries {
        let noise = noise_for(ctx.settings, index, attempt);
        let mut outcome = search::fill(ctx, seeded, &mut rng, noise, &banned);

        if matches!(outcome, FillOutcome::Exhausted) && !banned.is_empty() {
            debug!(
                "lineup {}: no completion with {} exclusions, relaxing",
                index + 1,
                banned.len()
            );
            banned.clear();
            outcome = search::fill(ctx, seeded, &mut rng, noise, &banned);
        }

        match outcome {
            FillOutcome::Stopped => return LineupOutcome::Stopped,
            FillOutcome::Exhausted => continue,
            FillOutcome::Complete(lineup) => {
                if signatures.insert(lineup.signature()) {
                    return LineupOutcome::Built {
                        lineup,
                        duplicate: false,
                    };
                }
                debug!("lineup {}: signature collision on attempt {}", index + 1, attempt);
                let excludable: Vec<PlayerId> = lineup
                    .player_ids()
                    .into_iter()
                    .filter(|id| !ctx.locked.contains(id) && !banned.contains(id))
                    .collect();
                if let Some(&id) = excludable.choose(&mut rng) {
                    banned.insert(id);
                }
                last = Some(lineup);
            }
        }
    }

    match last.or_else(|| baseline.cloned()) {
        Some(lineup) => {
            warn!(
                "lineup {}: retries exhausted, accepting a duplicate lineup",
                index + 1
            );
            LineupOutcome::Built {
                lineup,
                duplicate: true,
            }
        }
        None => LineupOutcome::Exhausted,
    }
}

/// Derive a per-lineup seed so a lineup's draws do not depend on how many
/// draws earlier lineups consumed.
fn lineup_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Score noise for an attempt. The batch's first attempt is pure greedy.
fn noise_for(settings: &OptimizerSettings, index: usize, attempt: usize) -> f64 {
    if index == 0 && attempt == 0 {
        return 0.0;
    }
    (settings.exploration * (attempt + 1) as f64).min(1.0)
}

fn log_finished(batch: &Batch) {
    info!(
        "generated {}/{} lineups ({} duplicates{})",
        batch.lineups.len(),
        batch.requested,
        batch.duplicates,
        if batch.stopped { ", stopped early" } else { "" }
    );
}
