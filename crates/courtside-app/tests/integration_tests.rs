// Integration tests for courtside.
//
// These exercise the app end-to-end through the library crates' public API:
// slate loading, the optimizer batch and its report, CSV export, and the
// interactive session store with its SQLite persistence.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use courtside_app::batch::{self, BatchOptions};
use courtside_app::config;
use courtside_app::db::Database;
use courtside_app::pool;
use courtside_app::session::{SessionKey, SessionStore};
use courtside_core::{
    eligibility, BatchRequest, ErrorKind, OptimizeError, OptimizerSettings, Platform, PlayerId,
    PlayerPool,
};

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the crate root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

fn fixture_players() -> Vec<courtside_core::Player> {
    pool::load_players(&Path::new(FIXTURES).join("players.csv")).expect("fixture should load")
}

fn draftkings_pool() -> Arc<PlayerPool> {
    Arc::new(pool::eligible_pool(&fixture_players(), Platform::DraftKings, &[]))
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ===========================================================================
// Slate loading
// ===========================================================================

#[test]
fn fixture_slate_loads_and_skips_bad_rows() {
    let players = fixture_players();
    let dk = players
        .iter()
        .filter(|p| p.platform == Platform::DraftKings)
        .count();
    let fd = players
        .iter()
        .filter(|p| p.platform == Platform::FanDuel)
        .count();
    // 30 on the slate, 1 sitting out; two malformed rows are dropped.
    assert_eq!(dk, 31);
    assert_eq!(fd, 12);
    assert!(players.iter().all(|p| p.id != PlayerId(1098)));
}

#[test]
fn eligible_pool_is_sorted_by_projection() {
    let pool = draftkings_pool();
    assert_eq!(pool.len(), 30);
    assert_eq!(pool.players()[0].name, "Anthony Davis");
    assert!(!pool.contains(PlayerId(1099)));
    for pair in pool.players().windows(2) {
        assert!(pair[0].proj_points >= pair[1].proj_points);
    }
}

#[test]
fn game_filter_limits_pool_to_selected_teams() {
    let teams = pool::parse_games("BOS-NYK");
    let pool = pool::eligible_pool(&fixture_players(), Platform::DraftKings, &teams);
    assert_eq!(pool.len(), 14);
    assert!(pool.iter().all(|p| p.team == "BOS" || p.team == "NYK"));
}

// ===========================================================================
// Optimizer batches
// ===========================================================================

#[tokio::test]
async fn batch_of_three_keeps_the_locked_player() {
    let pool = draftkings_pool();
    let template = Platform::DraftKings.default_template();
    let tatum = PlayerId(1009);

    let report = batch::run_batch(
        Arc::clone(&pool),
        template.clone(),
        BatchRequest::new(3).with_locked(vec![tatum]),
        OptimizerSettings::default(),
        BatchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.lineups.len(), 3);
    assert_eq!(report.unproduced, 0);
    assert!(!report.stopped);

    let mut signatures = HashSet::new();
    for lineup in &report.lineups {
        assert!(lineup.is_member(tatum));
        assert!(lineup.is_full());
        assert!(lineup.spent() <= template.salary_cap());
        for slot in lineup.slots() {
            let occupant = slot.occupant.as_ref().unwrap();
            assert!(eligibility::matches(&occupant.positions, slot.label));
        }
        signatures.insert(lineup.signature());
    }
    assert_eq!(signatures.len(), 3);

    let row = report
        .exposure
        .iter()
        .find(|r| r.item.id == tatum)
        .expect("locked player should be in the exposure table");
    assert_eq!(row.item.lineups, 3);
    assert_eq!(row.rank, 1);
}

#[tokio::test]
async fn batch_on_a_game_subset_with_parallel_workers() {
    let teams = pool::parse_games("BOS-NYK");
    let pool = Arc::new(pool::eligible_pool(
        &fixture_players(),
        Platform::DraftKings,
        &teams,
    ));
    let report = batch::run_batch(
        Arc::clone(&pool),
        Platform::DraftKings.default_template(),
        BatchRequest::new(5),
        OptimizerSettings::default(),
        BatchOptions {
            time_limit: Some(Duration::from_secs(30)),
            workers: 3,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.lineups.len() + report.unproduced, 5);
    for lineup in &report.lineups {
        assert!(lineup.player_ids().iter().all(|id| pool.contains(*id)));
        assert!(lineup.spent() <= 50_000);
    }
}

#[tokio::test]
async fn invalid_request_surfaces_optimize_error() {
    let err = batch::run_batch(
        draftkings_pool(),
        Platform::DraftKings.default_template(),
        BatchRequest::new(2).with_locked(vec![PlayerId(424242)]),
        OptimizerSettings::default(),
        BatchOptions::default(),
    )
    .await
    .unwrap_err();

    let opt = err
        .downcast_ref::<OptimizeError>()
        .expect("should carry an OptimizeError");
    assert_eq!(opt.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn locked_salary_over_cap_is_rejected() {
    // Davis, Tatum, LeBron, Curry, Brunson, Jaylen Brown: 57,000
    let locked = [1022, 1009, 1020, 1013, 1001, 1008]
        .into_iter()
        .map(PlayerId)
        .collect();
    let err = batch::run_batch(
        draftkings_pool(),
        Platform::DraftKings.default_template(),
        BatchRequest::new(1).with_locked(locked),
        OptimizerSettings::default(),
        BatchOptions::default(),
    )
    .await
    .unwrap_err();
    let opt = err.downcast_ref::<OptimizeError>().unwrap();
    assert_eq!(opt.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn zero_time_limit_returns_a_consistent_partial_batch() {
    let report = batch::run_batch(
        draftkings_pool(),
        Platform::DraftKings.default_template(),
        BatchRequest::new(20),
        OptimizerSettings::default(),
        BatchOptions {
            time_limit: Some(Duration::ZERO),
            workers: 1,
        },
    )
    .await
    .unwrap();

    assert_eq!(report.lineups.len() + report.unproduced, 20);
    assert_eq!(report.stopped, report.unproduced > 0);
}

#[tokio::test]
async fn report_exports_with_totals() {
    let template = Platform::DraftKings.default_template();
    let report = batch::run_batch(
        draftkings_pool(),
        template.clone(),
        BatchRequest::new(2),
        OptimizerSettings::default(),
        BatchOptions::default(),
    )
    .await
    .unwrap();

    let dir = temp_dir("courtside_it_export");
    let path = dir.join("nested").join("dk.csv");
    report.write_csv(&template, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "PG,SG,SF,PF,C,G,F,UTIL,Spent,Projected");
    assert_eq!(lines.len(), 3);
    let first: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(first.len(), 10);
    assert_eq!(first[8], report.lineups[0].spent().to_string());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn batch_runs_are_recorded() {
    let db = Database::open(":memory:").unwrap();
    let report = batch::run_batch(
        draftkings_pool(),
        Platform::DraftKings.default_template(),
        BatchRequest::new(2),
        OptimizerSettings::default(),
        BatchOptions::default(),
    )
    .await
    .unwrap();

    db.record_batch_run(&report.run_record("run_it_1", "DraftKings"))
        .unwrap();
    let runs = db.load_batch_runs("DraftKings", 5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].produced, 2);
}

// ===========================================================================
// Interactive sessions
// ===========================================================================

fn session_store() -> SessionStore {
    let players = fixture_players();
    let mut store = SessionStore::new();
    for platform in [Platform::DraftKings, Platform::FanDuel] {
        let pool = pool::eligible_pool(&players, platform, &[]);
        store.register(platform, platform.default_template(), Arc::new(pool));
    }
    store
}

#[test]
fn build_a_full_lineup_then_export_it() {
    let store = session_store();
    let key = SessionKey::new("web", Platform::DraftKings);

    // Cheap enough to fit all eight under 50,000.
    for id in [1030, 1024, 1025, 1021, 1023, 1026, 1029, 1017] {
        let view = store.add_player(&key, 0, PlayerId(id)).unwrap();
        assert!(view.msg.is_empty(), "player {id}: {}", view.msg);
    }
    let view = store.view(&key, 0).unwrap();
    assert!(view.full);
    assert_eq!(view.avg_remaining, 0.0);
    assert_eq!(store.lineup_status(&key).unwrap(), vec![true]);

    let csv = store.export(&key, &[0]).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "PG,SG,SF,PF,C,G,F,UTIL");
    assert_eq!(
        lines[1],
        "Miles McBride,Max Christie,Taurean Prince,Rui Hachimura,Jaxson Hayes,Gary Payton,Sam Hauser,Kevon Looney"
    );
}

#[test]
fn over_budget_add_is_rejected_without_change() {
    let store = session_store();
    let key = SessionKey::new("web", Platform::DraftKings);
    for id in [1022, 1009, 1020, 1013, 1001] {
        store.add_player(&key, 0, PlayerId(id)).unwrap();
    }
    let before = store.view(&key, 0).unwrap();
    assert_eq!(before.spent, 48_800);

    let view = store.add_player(&key, 0, PlayerId(1008)).unwrap();
    assert_eq!(view.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Budget));
    assert_eq!(view.spent, before.spent);
    assert_eq!(view.player_ids, before.player_ids);
}

#[test]
fn platforms_keep_separate_lineups() {
    let store = session_store();
    store
        .add_player(&SessionKey::new("web", Platform::DraftKings), 0, PlayerId(1001))
        .unwrap();
    let fd = store
        .add_player(&SessionKey::new("web", Platform::FanDuel), 0, PlayerId(2001))
        .unwrap();
    assert_eq!(fd.player_ids, vec![PlayerId(2001)]);
    assert_eq!(fd.slots.len(), 9);

    // A DraftKings id means nothing on FanDuel.
    let view = store
        .add_player(&SessionKey::new("web", Platform::FanDuel), 0, PlayerId(1002))
        .unwrap();
    assert_eq!(
        view.error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::UnknownPlayer)
    );
}

#[test]
fn sessions_survive_a_restart() {
    let dir = temp_dir("courtside_it_restart");
    let db_path = dir.join("courtside.db");
    let key = SessionKey::new("web", Platform::DraftKings);

    {
        let db = Database::open(db_path.to_str().unwrap()).unwrap();
        let store = session_store();
        store.add_player(&key, 0, PlayerId(1013)).unwrap();
        store.add_player(&key, 2, PlayerId(1010)).unwrap();
        store.save_to(&db).unwrap();
    }

    let db = Database::open(db_path.to_str().unwrap()).unwrap();
    let store = session_store();
    assert_eq!(store.restore_from(&db).unwrap(), 1);
    assert_eq!(store.lineup_count(&key).unwrap(), 3);
    assert_eq!(store.view(&key, 0).unwrap().player_ids, vec![PlayerId(1013)]);
    assert_eq!(store.view(&key, 2).unwrap().player_ids, vec![PlayerId(1010)]);

    // Clearing everything and saving leaves a single empty lineup behind.
    store.clear_all_lineups(&key).unwrap();
    store.save_to(&db).unwrap();
    let reloaded = session_store();
    reloaded.restore_from(&db).unwrap();
    assert_eq!(reloaded.lineup_count(&key).unwrap(), 1);
    assert!(reloaded.view(&key, 0).unwrap().player_ids.is_empty());

    drop(db);
    let _ = std::fs::remove_dir_all(&dir);
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn shipped_defaults_load_through_the_copy_path() {
    let dir = temp_dir("courtside_it_config");
    std::fs::create_dir_all(dir.join("defaults")).unwrap();
    std::fs::copy(
        "defaults/courtside.toml",
        dir.join("defaults").join("courtside.toml"),
    )
    .unwrap();

    let copied = config::ensure_config_file(&dir).unwrap();
    assert_eq!(copied, Some(dir.join("config").join("courtside.toml")));
    let config = config::load_config_from(&dir).unwrap();
    assert_eq!(config.optimizer.settings(), OptimizerSettings::default());
    assert_eq!(
        config.template_for(Platform::Yahoo),
        Platform::Yahoo.default_template()
    );

    let _ = std::fs::remove_dir_all(&dir);
}
