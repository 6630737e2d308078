// Single-lineup search: locked-player seeding and the choice-point fill.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::OptimizeError;
use crate::lineup::Lineup;
use crate::player::{Player, PlayerId, PlayerPool};
use crate::template::RosterTemplate;

use super::{OptimizerSettings, SearchBudget};

/// Read-only inputs shared by every fill in a batch.
pub(crate) struct SearchContext<'a> {
    pub pool: &'a PlayerPool,
    pub settings: &'a OptimizerSettings,
    pub budget: &'a SearchBudget,
    pub locked: &'a HashSet<PlayerId>,
}

pub(crate) enum FillOutcome {
    Complete(Lineup),
    /// No completion within the backtracking budget.
    Exhausted,
    /// The search budget ran out.
    Stopped,
}

/// One decision on the search stack: a slot and its candidates, best first.
/// `next` points at the candidate currently placed in the slot.
#[derive(Debug)]
struct ChoicePoint {
    slot: usize,
    ranked: Vec<usize>,
    next: usize,
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Place every locked player.
///
/// Each player takes the first open eligible slot in template order. When
/// none is open, earlier locked players are shifted to other eligible slots
/// along an augmenting path; if that fails too the lock set cannot coexist.
pub(crate) fn seed_locked(
    template: &RosterTemplate,
    locked: &[&Player],
) -> Result<Lineup, OptimizeError> {
    let labels = template.slots();
    let mut occupant: Vec<Option<usize>> = vec![None; labels.len()];

    for (i, player) in locked.iter().enumerate() {
        let open = (0..labels.len())
            .find(|&s| occupant[s].is_none() && player.eligible_for(labels[s]));
        match open {
            Some(s) => occupant[s] = Some(i),
            None => {
                let mut visited = vec![false; labels.len()];
                if !augment(i, locked, template, &mut occupant, &mut visited) {
                    return Err(OptimizeError::Infeasible(format!(
                        "locked player {} ({}) has no slot left alongside the other locked players",
                        player.name,
                        player.position_str()
                    )));
                }
            }
        }
    }

    let mut lineup = Lineup::new(template);
    for (slot, holder) in occupant.iter().enumerate() {
        if let Some(i) = holder {
            lineup
                .assign(slot, locked[*i])
                .map_err(|e| OptimizeError::Infeasible(e.to_string()))?;
        }
    }
    Ok(lineup)
}

fn augment(
    player: usize,
    locked: &[&Player],
    template: &RosterTemplate,
    occupant: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for (slot, &label) in template.slots().iter().enumerate() {
        if visited[slot] || !locked[player].eligible_for(label) {
            continue;
        }
        visited[slot] = true;
        let movable = match occupant[slot] {
            None => true,
            Some(other) => augment(other, locked, template, occupant, visited),
        };
        if movable {
            occupant[slot] = Some(player);
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Fill
// ---------------------------------------------------------------------------

/// Complete `seeded` with players from the pool.
///
/// Repeatedly picks the open slot with the fewest affordable candidates and
/// places its best-scoring candidate. On a dead end the most recent choice
/// point moves to its next candidate; exhausted choice points are popped.
/// `noise` perturbs scores for exploration; `banned` players are skipped.
pub(crate) fn fill(
    ctx: &SearchContext<'_>,
    seeded: &Lineup,
    rng: &mut StdRng,
    noise: f64,
    banned: &HashSet<PlayerId>,
) -> FillOutcome {
    let mut lineup = seeded.clone();
    let mut stack: Vec<ChoicePoint> = Vec::new();
    let mut backtracks = 0usize;
    let mut steps = 0u64;

    loop {
        steps += 1;
        if ctx.budget.should_stop(steps) {
            return FillOutcome::Stopped;
        }
        if lineup.is_full() {
            return FillOutcome::Complete(lineup);
        }

        if let Some(mut choice) = next_choice(ctx, &lineup, rng, noise, banned) {
            if place_next_candidate(ctx.pool, &mut lineup, &mut choice) {
                stack.push(choice);
                continue;
            }
        }

        // Dead end: relax the most recent choice to its next-best candidate.
        loop {
            backtracks += 1;
            if backtracks > ctx.settings.max_backtracks {
                return FillOutcome::Exhausted;
            }
            let Some(mut choice) = stack.pop() else {
                return FillOutcome::Exhausted;
            };
            lineup.unassign(choice.slot);
            choice.next += 1;
            if place_next_candidate(ctx.pool, &mut lineup, &mut choice) {
                stack.push(choice);
                break;
            }
        }
    }
}

/// Assign the first candidate from `choice.next` onward that the lineup
/// accepts. Returns `false` when the candidates are used up.
fn place_next_candidate(pool: &PlayerPool, lineup: &mut Lineup, choice: &mut ChoicePoint) -> bool {
    let players = pool.players();
    while let Some(&idx) = choice.ranked.get(choice.next) {
        if lineup.assign(choice.slot, &players[idx]).is_ok() {
            return true;
        }
        choice.next += 1;
    }
    false
}

/// Build the next choice point, or `None` on a dead end.
///
/// Every open slot reserves the salary of its cheapest eligible player; a
/// candidate is affordable for a slot if it fits in what the other open
/// slots leave over. This is a lower bound (it ignores that two slots may
/// count the same cheap player) so it prunes without ever rejecting a
/// feasible completion.
fn next_choice(
    ctx: &SearchContext<'_>,
    lineup: &Lineup,
    rng: &mut StdRng,
    noise: f64,
    banned: &HashSet<PlayerId>,
) -> Option<ChoicePoint> {
    let players = ctx.pool.players();
    let members: HashSet<PlayerId> = lineup.player_ids().into_iter().collect();
    let usable = |p: &Player| !members.contains(&p.id) && !banned.contains(&p.id);

    let open: Vec<usize> = lineup
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_empty())
        .map(|(i, _)| i)
        .collect();

    let mut cheapest = Vec::with_capacity(open.len());
    for &slot in &open {
        let label = lineup.slots()[slot].label;
        let min = players
            .iter()
            .filter(|p| usable(p) && p.eligible_for(label))
            .map(|p| u64::from(p.salary))
            .min()?;
        cheapest.push(min);
    }

    let remaining = u64::from(lineup.remaining_budget());
    let reserve: u64 = cheapest.iter().sum();
    if reserve > remaining {
        return None;
    }

    let mut best: Option<(usize, Vec<usize>)> = None;
    for (k, &slot) in open.iter().enumerate() {
        let allowance = remaining - (reserve - cheapest[k]);
        let label = lineup.slots()[slot].label;
        let candidates: Vec<usize> = players
            .iter()
            .enumerate()
            .filter(|(_, p)| usable(p) && p.eligible_for(label) && u64::from(p.salary) <= allowance)
            .map(|(i, _)| i)
            .collect();
        // Strictly fewer wins, so template order breaks ties.
        if best.as_ref().map_or(true, |(_, c)| candidates.len() < c.len()) {
            best = Some((slot, candidates));
        }
    }

    let (slot, candidates) = best?;
    let per_slot_budget = remaining as f64 / open.len() as f64;
    let ranked = rank_candidates(
        players,
        candidates,
        per_slot_budget,
        ctx.settings.value_weight,
        noise,
        rng,
    );
    Some(ChoicePoint {
        slot,
        ranked,
        next: 0,
    })
}

/// Order candidates by score, best first. Every candidate also draws a
/// random key so exact ties fall in a seeded, reproducible order.
fn rank_candidates(
    players: &[Player],
    candidates: Vec<usize>,
    per_slot_budget: f64,
    value_weight: f64,
    noise: f64,
    rng: &mut StdRng,
) -> Vec<usize> {
    let mut scored: Vec<(f64, u64, usize)> = candidates
        .into_iter()
        .map(|i| {
            let base = score(&players[i], per_slot_budget, value_weight);
            let jitter = if noise > 0.0 {
                1.0 + noise * rng.gen_range(-1.0..=1.0)
            } else {
                1.0
            };
            // Unusable projections rank behind every real score.
            let key = if base.is_finite() { base * jitter } else { f64::NEG_INFINITY };
            (key, rng.gen::<u64>(), i)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, i)| i).collect()
}

/// Projected points scaled by how the salary compares to the budget left
/// per open slot.
///
/// `value_weight` = 0 ranks by raw points; 1 ranks by points per dollar
/// relative to the per-slot budget. Values in between blend the two, so a
/// player priced above the per-slot budget is discounted and a bargain is
/// boosted.
pub(crate) fn score(player: &Player, per_slot_budget: f64, value_weight: f64) -> f64 {
    let salary = f64::from(player.salary.max(1));
    let ratio = per_slot_budget.max(1.0) / salary;
    player.proj_points * ratio.powf(value_weight)
}
