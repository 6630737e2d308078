// Courtside entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, the terminal is for command output)
// 2. Parse the command line
// 3. Load config, the player slate and the database
// 4. Run the command; builder commands restore and save session lineups

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use courtside_core::{rank_by, BatchRequest, Platform, Player, PlayerId, RankOrder};
use tracing::info;

use courtside_app::batch::{self, BatchOptions, BatchReport};
use courtside_app::config::{self, Config};
use courtside_app::db::Database;
use courtside_app::pool;
use courtside_app::session::{LineupView, SessionKey, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(about = "Daily fantasy basketball lineup builder and optimizer")]
#[command(version)]
struct Cli {
    /// Session whose interactive lineups the builder commands edit
    #[arg(long, default_value = "default", global = true)]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a batch of distinct lineups and export them to CSV
    Optimize {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,

        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Player ids every lineup must contain, e.g. 101,205
        #[arg(long, value_delimiter = ',')]
        lock: Vec<u32>,

        /// Restrict the pool to these games, e.g. "BOS-NYK;LAL-GSW"
        #[arg(long)]
        games: Option<String>,

        /// Output CSV path (default: <export dir>/<platform>_<run id>.csv)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Add or remove players in an interactive lineup
    Build {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,

        /// 1-based lineup number; a new number adds a lineup
        #[arg(long, default_value_t = 1)]
        lineup: usize,

        #[arg(long, value_delimiter = ',')]
        add: Vec<u32>,

        #[arg(long, value_delimiter = ',')]
        remove: Vec<u32>,

        /// Empty the lineup before applying the other actions
        #[arg(long)]
        clear: bool,
    },

    /// Discard all interactive lineups for a platform but an empty first one
    Clear {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,
    },

    /// Show which interactive lineups are complete
    Status {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,
    },

    /// Export interactive lineups to CSV
    Export {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,

        /// 1-based lineup numbers (default: every complete lineup)
        #[arg(long, value_delimiter = ',')]
        lineups: Vec<usize>,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the eligible player pool ranked by projected points
    Players {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,

        #[arg(long)]
        games: Option<String>,
    },

    /// Show recent optimizer runs
    History {
        #[arg(long, value_parser = parse_platform)]
        platform: Platform,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    Platform::from_name(s).ok_or_else(|| {
        format!("unknown platform `{s}` (expected FanDuel, DraftKings or Yahoo)")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Courtside starting up");

    // 2. Parse the command line
    let cli = Cli::parse();

    // 3. Load config, slate and database
    let config = config::load_config().context("failed to load configuration")?;
    let players = pool::load_players(Path::new(&config.data_paths.players))
        .context("failed to load players")?;
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Run the command
    match cli.command {
        Commands::Optimize {
            platform,
            count,
            lock,
            games,
            out,
            seed,
        } => run_optimize(&config, &db, &players, platform, count, lock, games, out, seed).await,
        Commands::Build {
            platform,
            lineup,
            add,
            remove,
            clear,
        } => {
            let index = lineup_index(lineup)?;
            let store = open_sessions(&config, &db, &players)?;
            let key = SessionKey::new(cli.session, platform);

            let mut view = store.view(&key, index).ok();
            if clear {
                view = Some(store.clear_lineup(&key, index)?);
            }
            for id in remove {
                view = Some(store.remove_player(&key, index, PlayerId(id))?);
            }
            for id in add {
                let v = store.add_player(&key, index, PlayerId(id))?;
                if !v.msg.is_empty() {
                    println!("player {id}: {}", v.msg);
                }
                view = Some(v);
            }

            match view {
                Some(view) => print_view(&view),
                None => bail!("lineup {lineup} does not exist"),
            }
            store.save_to(&db)?;
            Ok(())
        }
        Commands::Clear { platform } => {
            let store = open_sessions(&config, &db, &players)?;
            let view = store.clear_all_lineups(&SessionKey::new(cli.session, platform))?;
            print_view(&view);
            store.save_to(&db)?;
            Ok(())
        }
        Commands::Status { platform } => {
            let store = open_sessions(&config, &db, &players)?;
            let status = store.lineup_status(&SessionKey::new(cli.session, platform))?;
            for (i, full) in status.iter().enumerate() {
                println!("lineup {:>3}: {}", i + 1, if *full { "complete" } else { "incomplete" });
            }
            Ok(())
        }
        Commands::Export {
            platform,
            lineups,
            out,
        } => {
            let store = open_sessions(&config, &db, &players)?;
            let key = SessionKey::new(cli.session, platform);
            let indices: Vec<usize> = if lineups.is_empty() {
                store
                    .lineup_status(&key)?
                    .iter()
                    .enumerate()
                    .filter_map(|(i, full)| full.then_some(i))
                    .collect()
            } else {
                lineups
                    .into_iter()
                    .map(lineup_index)
                    .collect::<anyhow::Result<_>>()?
            };
            if indices.is_empty() {
                bail!("no complete lineups to export");
            }
            let csv = store.export(&key, &indices)?;
            let path = out.unwrap_or_else(|| {
                Path::new(&config.export_dir)
                    .join(format!("{}_manual.csv", platform.name().to_lowercase()))
            });
            write_file(&path, &csv)?;
            println!("exported {} lineups to {}", indices.len(), path.display());
            Ok(())
        }
        Commands::Players { platform, games } => {
            let teams = games.as_deref().map(pool::parse_games).unwrap_or_default();
            let pool = pool::eligible_pool(&players, platform, &teams);
            let (ranked, _) = rank_by(
                pool.players().to_vec(),
                |p| p.proj_points,
                RankOrder::Descending,
            );
            for r in ranked {
                print_player(r.rank, &r.item);
            }
            Ok(())
        }
        Commands::History { platform, limit } => {
            for run in db.load_batch_runs(platform.name(), limit)? {
                println!(
                    "{}  {}/{} lineups  {} duplicates  avg {:.2}{}",
                    run.run_id,
                    run.produced,
                    run.requested,
                    run.duplicates,
                    run.avg_projected,
                    if run.stopped { "  (stopped)" } else { "" }
                );
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_optimize(
    config: &Config,
    db: &Database,
    players: &[Player],
    platform: Platform,
    count: usize,
    lock: Vec<u32>,
    games: Option<String>,
    out: Option<PathBuf>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let teams = games.as_deref().map(pool::parse_games).unwrap_or_default();
    let pool = Arc::new(pool::eligible_pool(players, platform, &teams));
    let template = config.template_for(platform);
    let mut settings = config.optimizer.settings();
    if let Some(seed) = seed {
        settings.seed = seed;
    }
    let request =
        BatchRequest::new(count).with_locked(lock.into_iter().map(PlayerId).collect());

    info!(
        "Optimizing {} {} lineups from {} players",
        count,
        platform,
        pool.len()
    );
    let report = batch::run_batch(
        Arc::clone(&pool),
        template.clone(),
        request,
        settings,
        BatchOptions::from_config(&config.optimizer),
    )
    .await?;

    let run_id = Database::generate_run_id();
    let path = out.unwrap_or_else(|| {
        Path::new(&config.export_dir).join(format!(
            "{}_{}.csv",
            platform.name().to_lowercase(),
            run_id
        ))
    });
    report.write_csv(&template, &path)?;
    db.record_batch_run(&report.run_record(&run_id, platform.name()))?;

    print_report(&report);
    println!("wrote {}", path.display());
    Ok(())
}

/// Builder sessions for every platform, with previously saved lineups.
fn open_sessions(config: &Config, db: &Database, players: &[Player]) -> anyhow::Result<SessionStore> {
    let mut store = SessionStore::new();
    for platform in Platform::ALL {
        let pool = pool::eligible_pool(players, platform, &[]);
        store.register(platform, config.template_for(platform), Arc::new(pool));
    }
    store.restore_from(db)?;
    Ok(store)
}

fn lineup_index(number: usize) -> anyhow::Result<usize> {
    match number.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("lineup numbers start at 1"),
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_view(view: &LineupView) {
    println!("lineup {}", view.index + 1);
    for slot in &view.slots {
        match &slot.occupant {
            Some(p) => println!(
                "  {:<5} {:<26} {:>7} {:>7.2}",
                slot.label.display_str(),
                p.name,
                p.salary,
                p.proj_points
            ),
            None => println!("  {:<5} -", slot.label.display_str()),
        }
    }
    println!(
        "  spent {}  projected {:.2}  {}",
        view.spent,
        view.projected,
        if view.full {
            "complete".to_string()
        } else {
            format!("{:.0} left per open slot", view.avg_remaining)
        }
    );
    if !view.msg.is_empty() {
        println!("  {}", view.msg);
    }
}

fn print_report(report: &BatchReport) {
    println!(
        "{} of {} lineups, average projection {:.2}",
        report.lineups.len(),
        report.requested,
        report.avg_projected
    );
    if report.stopped {
        println!("stopped early: {} lineups not produced", report.unproduced);
    }
    if report.duplicates > 0 {
        println!("{} lineups repeat an earlier one", report.duplicates);
    }
    println!("exposure:");
    for row in &report.exposure {
        let e = &row.item;
        println!(
            "  {:>3}. {:<26} {:<4} {:<6} {:>3} ({:.0}%)",
            row.rank,
            e.name,
            e.team,
            e.position,
            e.lineups,
            e.share * 100.0
        );
    }
}

fn print_player(rank: usize, p: &Player) {
    println!(
        "{:>4}. {:>8} {:<26} {:<4} {:<6} {:>7} {:>7.2}",
        rank,
        p.id.0,
        p.name,
        p.team,
        p.position_str(),
        p.salary,
        p.proj_points
    );
}

/// Initialize tracing to log to a file (the terminal carries command output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("courtside.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtside=info,courtside_app=info,courtside_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
