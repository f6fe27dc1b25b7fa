use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rank_tracker::api::{build_router, state::AppState};
use rank_tracker::calculate::{
    calculate_win_rate, classify_rank, LeaderboardAssembler, LeaderboardQuery,
};
use rank_tracker::config::AppConfig;
use rank_tracker::fetch::Fetcher;
use rank_tracker::models::{ConnectCode, Metric, Player, PlayerId, SnapshotTime};
use rank_tracker::parse_duration;
use rank_tracker::storage::{
    import_records, prune_duplicates, prune_orphan_timestamps, SnapshotStore, TimeSeriesStore,
};
use rank_tracker::sync::{ProfileSource, SlippiClient, SyncOrchestrator};

#[derive(Parser)]
#[command(name = "rank-tracker")]
#[command(about = "Slippi ranked stats tracker")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile stored history with the ranking service
    Sync {
        /// Run one pass and exit
        #[arg(long)]
        once: bool,

        /// Run continuously at interval
        #[arg(long)]
        watch: bool,

        /// Pass interval (e.g., "6h", "30m"); defaults to the config value
        #[arg(long)]
        interval: Option<String>,

        /// Only refresh this player
        #[arg(long)]
        player: Option<u64>,

        /// Cache the leaderboard after each pass
        #[arg(long)]
        snapshot: bool,
    },

    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Also run periodic passes in the background
        #[arg(long)]
        watch: bool,
    },

    /// Start tracking a player
    Register {
        #[arg(long)]
        id: u64,

        /// Connect code, e.g. "FOX#123"
        #[arg(long)]
        code: String,

        /// Display name (defaults to the connect code)
        #[arg(long)]
        name: Option<String>,

        /// Skip the upstream existence check
        #[arg(long)]
        offline: bool,
    },

    /// Print the leaderboard
    Leaderboard {
        /// Rank as of this time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        #[arg(long)]
        since: Option<String>,

        /// Include players who never played a ranked set
        #[arg(long)]
        all: bool,
    },

    /// Print one player's history for a metric
    History {
        #[arg(long)]
        player: u64,

        /// elo, win_loss, regional_placement, global_placement, character_usage
        #[arg(long)]
        metric: String,
    },

    /// Classify a rating
    Rank {
        #[arg(long)]
        rating: f64,

        /// Currently holds a regional placement
        #[arg(long)]
        regional: bool,
    },

    /// Compact history and drop unused timestamps
    Prune {
        /// Metric to deduplicate
        #[arg(long)]
        metric: Option<String>,

        /// Deduplicate every metric
        #[arg(long)]
        all: bool,

        /// Remove timestamps with nothing attached
        #[arg(long)]
        orphans: bool,
    },

    /// Cache leaderboard snapshots
    Snapshot {
        /// Snapshot time (defaults to now)
        #[arg(long)]
        at: Option<String>,

        /// Backfill one snapshot per day between --from and --to
        #[arg(long)]
        daily: bool,

        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        /// Time of day (UTC) for daily snapshots
        #[arg(long, default_value = "23:59:00")]
        time: NaiveTime,
    },

    /// Backfill metric records from a JSONL file
    Import {
        #[arg(long)]
        path: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        AppConfig::default()
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn parse_time(value: &str) -> Result<SnapshotTime> {
    SnapshotTime::parse(value).with_context(|| format!("not a timestamp: {}", value))
}

fn profile_source(config: &AppConfig) -> Result<Arc<dyn ProfileSource>> {
    let fetcher = Fetcher::new(config.fetcher_config()?)?;
    Ok(Arc::new(SlippiClient::new(
        Arc::new(fetcher),
        &config.slippi.endpoint,
    )?))
}

fn print_leaderboard(assembler: &LeaderboardAssembler, query: &LeaderboardQuery) -> Result<()> {
    let entries = assembler.assemble(query)?;
    if entries.is_empty() {
        println!("No ranked players");
        return Ok(());
    }
    println!("As of {}", entries[0].as_of);
    for entry in entries {
        println!(
            "{:>4}. {:<24} {:<10} {:>9.2}  {:>4}W {:>4}L {:>5.1}%  {}",
            entry.position,
            entry.display_name,
            entry.connect_code,
            entry.elo,
            entry.wins,
            entry.losses,
            calculate_win_rate(entry.wins, entry.losses) * 100.0,
            entry.rank
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting rank-tracker v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn TimeSeriesStore> = Arc::new(SnapshotStore::open(config.storage())?);

    match cli.command {
        Commands::Sync {
            once,
            watch,
            interval,
            player,
            snapshot,
        } => {
            let mut sync_config = config.sync_config()?;
            if let Some(interval) = interval {
                sync_config.interval = parse_duration(&interval)
                    .with_context(|| format!("invalid interval: {}", interval))?;
            }
            sync_config.snapshot |= snapshot;

            let orchestrator = Arc::new(SyncOrchestrator::new(
                sync_config,
                Arc::clone(&store),
                profile_source(&config)?,
            ));

            if once || player.is_some() {
                let report = orchestrator.run_pass(player.map(PlayerId::new)).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if watch {
                let runner = Arc::clone(&orchestrator);
                let handle = tokio::spawn(runner.run_periodic());
                tokio::signal::ctrl_c().await?;
                tracing::info!("Shutting down after the current player");
                orchestrator.cancel().await;
                handle.await?;
            } else {
                bail!("Specify --once, --watch or --player");
            }
        }
        Commands::Serve { host, port, watch } => {
            let orchestrator = Arc::new(SyncOrchestrator::new(
                config.sync_config()?,
                Arc::clone(&store),
                profile_source(&config)?,
            ));
            if watch {
                tokio::spawn(Arc::clone(&orchestrator).run_periodic());
            }

            let mut state = AppState::new(Arc::clone(&store), orchestrator);
            state.hide_unplayed = config.sync.hide_unplayed;
            state.cors_origin = config.server.cors_origin.clone();

            let app = build_router(state);
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Register {
            id,
            code,
            name,
            offline,
        } => {
            let connect_code = ConnectCode::parse(&code)?;
            if let Some(existing) = store.player_by_code(&connect_code)? {
                bail!(
                    "{} is already tracked as player {}",
                    connect_code,
                    existing.id
                );
            }
            if !offline && !profile_source(&config)?.does_exist(connect_code.as_str()).await? {
                bail!("No account uses connect code {}", connect_code);
            }
            let name = name.unwrap_or_else(|| connect_code.to_string());
            store.register_player(Player::new(PlayerId::new(id), connect_code.clone(), name))?;
            println!("Registered {} as player {}", connect_code, id);
        }
        Commands::Leaderboard { until, since, all } => {
            let mut query =
                LeaderboardQuery::default().show_unplayed(all || !config.sync.hide_unplayed);
            if let Some(until) = until {
                query.until = Some(parse_time(&until)?);
            }
            if let Some(since) = since {
                query = query.since(parse_time(&since)?);
            }
            print_leaderboard(&LeaderboardAssembler::new(Arc::clone(&store)), &query)?;
        }
        Commands::History { player, metric } => {
            let metric: Metric = metric.parse().map_err(anyhow::Error::msg)?;
            let player = PlayerId::new(player);
            if store.player(player)?.is_none() {
                bail!("Player {} is not registered", player);
            }
            for record in store.history(player, metric)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Commands::Rank { rating, regional } => {
            println!("{}", classify_rank(rating, regional));
        }
        Commands::Prune {
            metric,
            all,
            orphans,
        } => {
            let metrics: Vec<Metric> = match (metric, all) {
                (_, true) => Metric::ALL.to_vec(),
                (Some(m), false) => vec![m.parse().map_err(anyhow::Error::msg)?],
                (None, false) => Vec::new(),
            };
            if metrics.is_empty() && !orphans {
                bail!("Specify --metric, --all or --orphans");
            }
            for metric in metrics {
                let report = prune_duplicates(store.as_ref(), metric)?;
                println!(
                    "{}: examined {}, deleted {}",
                    metric, report.examined, report.deleted
                );
            }
            if orphans {
                let removed = prune_orphan_timestamps(store.as_ref())?;
                println!("Removed {} orphan timestamps", removed);
            }
        }
        Commands::Snapshot {
            at,
            daily,
            from,
            to,
            time,
        } => {
            let assembler = LeaderboardAssembler::new(Arc::clone(&store));
            if daily {
                let (Some(from), Some(to)) = (from, to) else {
                    bail!("--daily needs --from and --to");
                };
                let written = assembler.rebuild_daily(from, to, time)?;
                println!("Cached {} daily leaderboards", written);
            } else {
                let at = match at {
                    Some(at) => parse_time(&at)?,
                    None => SnapshotTime::now(),
                };
                let entries = assembler.snapshot(at)?;
                println!("Cached leaderboard at {} ({} entries)", at, entries.len());
            }
        }
        Commands::Import { path } => {
            let summary = import_records(store.as_ref(), &path)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
