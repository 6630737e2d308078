// Batch orchestration: runs the optimizer off the async runtime under a time
// limit and summarizes the result for display and export.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use courtside_core::{
    export, optimizer, rank_by, Batch, BatchRequest, Lineup, OptimizerSettings, PlayerId,
    PlayerPool, RankOrder, Ranked, RosterTemplate, SearchBudget,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::OptimizerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Raise the stop flag after this long; `None` runs to completion.
    pub time_limit: Option<Duration>,
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            time_limit: None,
            workers: 1,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        BatchOptions {
            time_limit: config.time_limit(),
            workers: config.workers.max(1),
        }
    }
}

/// How often one player appears across a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    pub position: String,
    /// Number of lineups that include the player.
    pub lineups: usize,
    /// `lineups` as a fraction of the lineups produced.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub lineups: Vec<Lineup>,
    pub requested: usize,
    pub unproduced: usize,
    pub duplicates: usize,
    pub stopped: bool,
    pub avg_projected: f64,
    /// Players in at least one lineup, most used first, ranked by usage.
    pub exposure: Vec<Ranked<Exposure>>,
}

/// One row of batch history as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRunRecord {
    pub run_id: String,
    pub platform: String,
    pub requested: usize,
    pub produced: usize,
    pub duplicates: usize,
    pub stopped: bool,
    pub avg_projected: f64,
}

impl BatchReport {
    /// Summarize `batch`, looking player details up in `pool`.
    pub fn from_batch(pool: &PlayerPool, batch: Batch) -> Self {
        let produced = batch.lineups.len();
        let avg_projected = if produced == 0 {
            0.0
        } else {
            batch.lineups.iter().map(Lineup::projected).sum::<f64>() / produced as f64
        };

        let mut counts: HashMap<PlayerId, usize> = HashMap::new();
        for lineup in &batch.lineups {
            for id in lineup.player_ids() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }

        // Pool order (best projection first) breaks ties in usage.
        let exposures: Vec<Exposure> = pool
            .iter()
            .filter_map(|p| {
                let lineups = counts.get(&p.id).copied()?;
                Some(Exposure {
                    id: p.id,
                    name: p.name.clone(),
                    team: p.team.clone(),
                    position: p.position_str(),
                    lineups,
                    share: lineups as f64 / produced as f64,
                })
            })
            .collect();
        let (exposure, _) = rank_by(exposures, |e| e.lineups as f64, RankOrder::Descending);

        BatchReport {
            unproduced: batch.unproduced(),
            requested: batch.requested,
            duplicates: batch.duplicates,
            stopped: batch.stopped,
            lineups: batch.lineups,
            avg_projected,
            exposure,
        }
    }

    pub fn run_record(&self, run_id: &str, platform: &str) -> BatchRunRecord {
        BatchRunRecord {
            run_id: run_id.to_string(),
            platform: platform.to_string(),
            requested: self.requested,
            produced: self.lineups.len(),
            duplicates: self.duplicates,
            stopped: self.stopped,
            avg_projected: self.avg_projected,
        }
    }

    /// Write the lineups with `Spent` and `Projected` columns to `path`,
    /// creating its directory if needed.
    pub fn write_csv(&self, template: &RosterTemplate, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        export::write_lineups(file, template, &self.lineups, true)
            .with_context(|| format!("failed to write lineups to {}", path.display()))?;
        Ok(())
    }
}

/// Run one optimizer batch on a blocking worker.
///
/// When the time limit passes, the stop flag is raised and the lineups built
/// so far are returned; the report's `unproduced` counts the shortfall.
/// Invalid or infeasible requests come back as an `OptimizeError` inside the
/// `anyhow::Error`.
pub async fn run_batch(
    pool: Arc<PlayerPool>,
    template: RosterTemplate,
    request: BatchRequest,
    settings: OptimizerSettings,
    options: BatchOptions,
) -> Result<BatchReport> {
    let stop = Arc::new(AtomicBool::new(false));
    let budget = SearchBudget::with_stop_flag(Arc::clone(&stop));
    let worker_pool = Arc::clone(&pool);
    let workers = options.workers;

    let mut handle = tokio::task::spawn_blocking(move || {
        optimizer::generate_parallel(&worker_pool, &template, &request, &settings, &budget, workers)
    });

    let joined = match options.time_limit {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("batch time limit of {:?} reached, stopping", limit);
                stop.store(true, Ordering::Relaxed);
                handle.await
            }
        },
        None => handle.await,
    };

    let batch = joined.context("optimizer task failed")??;
    let report = BatchReport::from_batch(&pool, batch);
    info!(
        "batch finished: {}/{} lineups, avg projected {:.2}",
        report.lineups.len(),
        report.requested,
        report.avg_projected
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtside_core::{Platform, Player, Position};
    use Position::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn player(id: u32, salary: u32, points: f64, positions: Vec<Position>) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("Player {id}"),
            team: "DEN".to_string(),
            salary,
            proj_points: points,
            positions,
            platform: Platform::DraftKings,
            plays_today: true,
        }
    }

    fn lineup_of(template: &RosterTemplate, pool: &PlayerPool, ids: &[u32]) -> Lineup {
        let mut lineup = Lineup::new(template);
        for (slot, id) in ids.iter().enumerate() {
            lineup.assign(slot, pool.get(PlayerId(*id)).unwrap()).unwrap();
        }
        lineup
    }

    #[test]
    fn report_counts_exposure_and_ranks_it() {
        let pool = PlayerPool::new(vec![
            player(1, 5_000, 40.0, vec![PointGuard]),
            player(2, 5_000, 30.0, vec![PointGuard]),
            player(3, 5_000, 20.0, vec![Center]),
            player(4, 5_000, 10.0, vec![Center]),
        ]);
        let template = RosterTemplate::new(vec![PointGuard, Center], 50_000);
        let batch = Batch {
            lineups: vec![
                lineup_of(&template, &pool, &[1, 3]),
                lineup_of(&template, &pool, &[1, 4]),
                lineup_of(&template, &pool, &[2, 3]),
            ],
            requested: 4,
            duplicates: 0,
            stopped: true,
        };

        let report = BatchReport::from_batch(&pool, batch);
        assert_eq!(report.unproduced, 1);
        assert!(report.stopped);
        assert!(approx_eq(report.avg_projected, (60.0 + 50.0 + 50.0) / 3.0, 1e-9));

        let rows: Vec<(u32, usize, usize)> = report
            .exposure
            .iter()
            .map(|r| (r.item.id.0, r.item.lineups, r.rank))
            .collect();
        assert_eq!(rows, vec![(1, 2, 1), (3, 2, 1), (2, 1, 2), (4, 1, 2)]);
        assert!(approx_eq(report.exposure[0].item.share, 2.0 / 3.0, 1e-9));
    }

    #[test]
    fn empty_batch_reports_zero_average() {
        let pool = PlayerPool::new(vec![player(1, 5_000, 40.0, vec![PointGuard])]);
        let batch = Batch {
            lineups: vec![],
            requested: 2,
            duplicates: 0,
            stopped: true,
        };
        let report = BatchReport::from_batch(&pool, batch);
        assert_eq!(report.avg_projected, 0.0);
        assert!(report.exposure.is_empty());
        assert_eq!(report.unproduced, 2);
    }

    #[test]
    fn run_record_copies_counts() {
        let pool = PlayerPool::default();
        let report = BatchReport::from_batch(
            &pool,
            Batch {
                lineups: vec![],
                requested: 3,
                duplicates: 0,
                stopped: false,
            },
        );
        let record = report.run_record("run_x", "Yahoo");
        assert_eq!(record.run_id, "run_x");
        assert_eq!(record.platform, "Yahoo");
        assert_eq!(record.requested, 3);
        assert_eq!(record.produced, 0);
    }

    #[test]
    fn options_follow_config() {
        let config = OptimizerConfig {
            seed: 1,
            max_backtracks: 10,
            diversity_retries: 1,
            value_weight: 0.0,
            exploration: 0.0,
            time_limit_ms: 250,
            workers: 0,
        };
        let options = BatchOptions::from_config(&config);
        assert_eq!(options.time_limit, Some(Duration::from_millis(250)));
        assert_eq!(options.workers, 1);
    }
}
