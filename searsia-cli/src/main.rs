//! Searsia CLI
//!
//! Drives the running-average TTL cache against simulated resources and
//! exports the statistics it learned.

mod simulated;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use searsia_cache::{CacheConfig, RunningAvgTtlCache};
use searsia_core::traits::Resource;

use crate::simulated::SimulatedResource;

/// Searsia - adaptive result cache for federated search
#[derive(Parser)]
#[command(name = "searsia")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload against simulated resources and report the learned TTLs
    Simulate {
        /// Number of simulated resources
        #[arg(short, long, default_value = "3")]
        resources: usize,
        /// Distinct queries per resource
        #[arg(short, long, default_value = "10")]
        queries: usize,
        /// Workload rounds; each round sends every query to every resource
        #[arg(long, default_value = "20")]
        rounds: usize,
        /// Pause between rounds (ms)
        #[arg(long, default_value = "100")]
        interval_ms: u64,
        /// Update interval of the first resource (ms); resource i changes every (i + 1) × this
        #[arg(long, default_value = "1000")]
        change_every_ms: u64,
        /// Search latency of every resource (ms)
        #[arg(long, default_value = "20")]
        latency_ms: u64,
        /// Probability that a single search fails
        #[arg(long, default_value = "0.0")]
        failure_rate: f64,
        /// Initial TTL (ms), overrides SEARSIA_INITIAL_TTL_MS
        #[arg(long)]
        initial_ttl_ms: Option<u64>,
        /// Statistics directory, overrides SEARSIA_STATISTICS_DIR
        #[arg(long)]
        stats_dir: Option<PathBuf>,
        /// Skip the statistics export
        #[arg(long)]
        no_export: bool,
    },

    /// Print the effective cache configuration
    Config,
}

struct SimulateArgs {
    resources: usize,
    queries: usize,
    rounds: usize,
    interval: Duration,
    change_every: Duration,
    latency: Duration,
    failure_rate: f64,
    initial_ttl_ms: Option<u64>,
    stats_dir: Option<PathBuf>,
    export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "searsia_cache=debug,searsia_cli=debug,info"
    } else {
        "searsia_cache=info,searsia_cli=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Simulate {
            resources,
            queries,
            rounds,
            interval_ms,
            change_every_ms,
            latency_ms,
            failure_rate,
            initial_ttl_ms,
            stats_dir,
            no_export,
        } => {
            cmd_simulate(SimulateArgs {
                resources,
                queries,
                rounds,
                interval: Duration::from_millis(interval_ms),
                change_every: Duration::from_millis(change_every_ms),
                latency: Duration::from_millis(latency_ms),
                failure_rate,
                initial_ttl_ms,
                stats_dir,
                export: !no_export,
            })
            .await
        }
        Commands::Config => cmd_config(),
    }
}

fn load_config(initial_ttl_ms: Option<u64>, stats_dir: Option<PathBuf>) -> Result<CacheConfig> {
    let mut config = CacheConfig::from_env().context("Invalid cache configuration")?;
    if let Some(ttl) = initial_ttl_ms {
        config.initial_ttl_ms = ttl;
    }
    if let Some(dir) = stats_dir {
        config.statistics_dir = dir;
    }
    Ok(config)
}

/// Print the effective configuration
fn cmd_config() -> Result<()> {
    let config = load_config(None, None)?;
    println!("{}", "⚙️  Cache configuration".cyan().bold());
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

/// Run the simulated workload
async fn cmd_simulate(args: SimulateArgs) -> Result<()> {
    if args.resources == 0 || args.queries == 0 {
        bail!("--resources and --queries must be at least 1");
    }
    if !(0.0..=1.0).contains(&args.failure_rate) {
        bail!("--failure-rate must be between 0 and 1");
    }

    let config = load_config(args.initial_ttl_ms, args.stats_dir)?;
    let cache = RunningAvgTtlCache::with_config(config);

    let resources: Vec<Arc<SimulatedResource>> = (0..args.resources)
        .map(|i| {
            Arc::new(
                SimulatedResource::new(format!("sim{}", i + 1), args.change_every * (i as u32 + 1))
                    .with_latency(args.latency)
                    .with_failure_rate(args.failure_rate),
            )
        })
        .collect();
    let queries: Vec<String> = (0..args.queries).map(|i| format!("query{i}")).collect();

    println!(
        "{} {} resources × {} queries × {} rounds",
        "🔁 Simulating:".cyan().bold(),
        args.resources,
        args.queries,
        args.rounds
    );

    let requests = (args.rounds * args.resources * args.queries) as u64;
    let pb = ProgressBar::new(args.rounds as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut errors = 0u64;
    for round in 0..args.rounds {
        let calls = resources.iter().flat_map(|resource| {
            queries.iter().map(|query| {
                let cache = cache.clone();
                let resource: Arc<dyn Resource> = resource.clone();
                let query = query.clone();
                async move { cache.get_search_result(resource, &query).await }
            })
        });
        for result in join_all(calls).await {
            if let Err(e) = result {
                errors += 1;
                warn!(round, error = %e, "Request failed");
            }
        }
        pb.inc(1);
        if round + 1 < args.rounds {
            tokio::time::sleep(args.interval).await;
        }
    }
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    println!("\n{}", "📊 Learned TTLs".yellow().bold());
    println!(
        "   {:<8} {:>10} {:>10} {:>12} {:>12}",
        "resource".dimmed(),
        "searches".dimmed(),
        "failures".dimmed(),
        "changes(ms)".dimmed(),
        "ttl(ms)".dimmed()
    );
    let mut searches = 0u64;
    for resource in &resources {
        searches += resource.searches();
        println!(
            "   {:<8} {:>10} {:>10} {:>12} {:>12}",
            resource.id(),
            resource.searches(),
            resource.failures(),
            resource.change_every().as_millis(),
            cache.current_ttl_ms(resource.id())
        );
    }

    let saved = requests.saturating_sub(searches);
    println!("\n{}", "✅ Done".green().bold());
    println!("   {} {}", "Requests:".dimmed(), requests);
    println!("   {} {}", "Searches:".dimmed(), searches);
    println!(
        "   {} {:.1}%",
        "Saved:".dimmed(),
        saved as f64 * 100.0 / requests.max(1) as f64
    );
    println!("   {} {}", "Failed requests:".dimmed(), errors);
    println!("   {} {:?}", "Elapsed:".dimmed(), elapsed);

    if args.export {
        let report = cache
            .export_statistics()
            .await
            .context("Failed to export statistics")?;
        println!(
            "\n{} {} files in {}",
            "💾 Statistics:".cyan().bold(),
            report.written.len(),
            cache.config().statistics_dir.display()
        );
        for failed in &report.failed {
            println!("   {} {}", "Not written:".red(), failed);
        }
    }

    Ok(())
}
