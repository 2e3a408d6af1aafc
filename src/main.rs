use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxy_rotor::pool::{FreeListProvider, ProxyValidator};
use proxy_rotor::{PoolConfig, ProxyPool};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A rotating proxy pool with validation, reliability scoring and quarantine
#[derive(Parser)]
#[command(name = "proxy-rotor")]
#[command(about = "Rotating proxy pool with validation and reliability scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pool: refresh on the configured interval and log stats
    Run {
        /// Perform a single refresh cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Fetch candidates from the configured providers and print them
    Fetch {
        /// Output file for the deduplicated candidate list
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate candidates from a file and report working proxies
    Check {
        /// Input file containing proxies (host:port per line)
        input: PathBuf,
        /// Output file for working proxies
        #[arg(short, long)]
        good: Option<PathBuf>,
        /// Output file for dead proxies
        #[arg(short, long)]
        bad: Option<PathBuf>,
        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of concurrent validations
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Test endpoint override
        #[arg(long)]
        test_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxy_rotor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { once } => run_pool(config, once).await,
        Commands::Fetch { output } => fetch_candidates(config, output).await,
        Commands::Check {
            input,
            good,
            bad,
            timeout,
            concurrency,
            test_url,
        } => check_proxies(config, input, good, bad, timeout, concurrency, test_url).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PoolConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {:?}", path))?;
            let config = serde_json::from_str(&content)
                .with_context(|| format!("parsing config file {:?}", path))?;
            info!("Configuration loaded from {:?}", path);
            Ok(config)
        }
        None => {
            warn!("No config file given, using defaults (no providers configured)");
            Ok(PoolConfig::default())
        }
    }
}

async fn run_pool(config: PoolConfig, once: bool) -> Result<()> {
    let interval = config.fetch_interval.max(1);
    let pool = ProxyPool::new(config)?;

    if let Err(e) = pool.refresh(true).await {
        error!("Initial refresh failed: {}", e);
    }
    log_stats(&pool);

    if once {
        println!("{}", serde_json::to_string_pretty(&pool.stats())?);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.tick().await; // first tick completes immediately
    loop {
        ticker.tick().await;
        if let Err(e) = pool.refresh(false).await {
            error!("Refresh failed: {}", e);
        }
        log_stats(&pool);
    }
}

fn log_stats(pool: &ProxyPool) {
    let stats = pool.stats();
    info!(
        "Pool: {} total, {} available, {} quarantined, avg latency {:.3}s",
        stats.total_proxies,
        stats.available_proxies,
        stats.quarantined_proxies,
        stats.avg_response_time
    );
}

async fn fetch_candidates(config: PoolConfig, output: Option<PathBuf>) -> Result<()> {
    if config.free_sources.is_empty() {
        warn!("No free sources configured, nothing to fetch");
        return Ok(());
    }

    let provider = FreeListProvider::new(config.free_sources)?;
    let candidates = provider.fetch().await?;
    println!("Fetched {} unique candidates", candidates.len());

    if let Some(path) = output {
        std::fs::write(&path, candidates.join("\n"))?;
        println!("Saved candidates to {:?}", path);
    } else {
        for candidate in &candidates {
            println!("{}", candidate);
        }
    }
    Ok(())
}

async fn check_proxies(
    mut config: PoolConfig,
    input: PathBuf,
    good: Option<PathBuf>,
    bad: Option<PathBuf>,
    timeout: Option<u64>,
    concurrency: Option<usize>,
    test_url: Option<String>,
) -> Result<()> {
    if let Some(timeout) = timeout {
        config.validation_timeout = timeout;
    }
    if let Some(concurrency) = concurrency {
        config.validation_batch_size = concurrency;
    }
    if let Some(url) = test_url {
        config.test_urls = vec![url];
    }

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("reading proxy list {:?}", input))?;
    let candidates = proxy_rotor::pool::parse::parse_candidates(&content);
    println!("Loaded {} candidates from {:?}", candidates.len(), input);

    let validator = ProxyValidator::new(&config);
    let results = validator.validate_batch(candidates).await;

    let (working, dead): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_valid);
    println!("Results: {} working, {} dead", working.len(), dead.len());

    for result in &working {
        println!("  {} ({:.2}s)", result.proxy, result.latency);
    }

    if let Some(path) = good {
        let list: Vec<&str> = working.iter().map(|r| r.proxy.as_str()).collect();
        std::fs::write(&path, list.join("\n"))?;
        println!("Saved {} working proxies to {:?}", list.len(), path);
    }
    if let Some(path) = bad {
        let list: Vec<&str> = dead.iter().map(|r| r.proxy.as_str()).collect();
        std::fs::write(&path, list.join("\n"))?;
        println!("Saved {} dead proxies to {:?}", list.len(), path);
    }

    Ok(())
}
