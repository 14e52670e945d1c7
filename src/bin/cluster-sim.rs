//! Drive a simulated pool cluster and report how requests were routed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::time::Instant;

use cluster_pool::config::{load_config, BackendConfig, ClusterConfig, PoolConfig};
use cluster_pool::observability::logging;
use cluster_pool::pool::{BoxError, Factory};
use cluster_pool::PoolCluster;

#[derive(Parser)]
#[command(name = "cluster-sim")]
#[command(about = "Route simulated requests across a cluster of pools", long_about = None)]
struct Cli {
    /// Cluster configuration (TOML). Defaults to three backends holding
    /// resources for 1s, 2s and 3s.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of acquisitions to issue.
    #[arg(short = 'n', long, default_value_t = 24)]
    requests: u64,

    /// Delay between acquisitions in milliseconds.
    #[arg(short, long, default_value_t = 105)]
    interval_ms: u64,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// A simulated backend session.
#[derive(Debug)]
struct Session {
    backend: usize,
}

#[derive(Debug, Serialize)]
struct PoolReport {
    name: String,
    acquisitions: usize,
    created: u64,
    create_failures: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    history: String,
    failed: usize,
    pools: Vec<PoolReport>,
}

fn default_config() -> ClusterConfig {
    let backend = |name: &str, hold_ms| BackendConfig {
        name: name.to_string(),
        hold_ms,
        fail_rate: 0.0,
    };
    ClusterConfig {
        pool: PoolConfig {
            max: 4,
            idle_timeout_ms: 1_000,
            ..PoolConfig::default()
        },
        backends: vec![
            backend("a", 1_000),
            backend("b", 2_000),
            backend("c", 3_000),
        ],
        ..ClusterConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    logging::init(&config.observability);

    let mut cluster = PoolCluster::new(Factory::new(config.pool.clone())?);
    for (backend, settings) in config.backends.iter().enumerate() {
        let fail_rate = settings.fail_rate;
        cluster.add_named(settings.name.clone(), move || async move {
            if fastrand::f64() < fail_rate {
                Err::<Session, BoxError>("simulated connect failure".into())
            } else {
                Ok(Session { backend })
            }
        });
    }
    tracing::info!(pools = cluster.len(), requests = cli.requests, "simulation starting");

    let history = Arc::new(Mutex::new(String::new()));
    let failed = Arc::new(AtomicUsize::new(0));
    let counts: Arc<Vec<AtomicUsize>> =
        Arc::new(config.backends.iter().map(|_| AtomicUsize::new(0)).collect());
    let start = Instant::now();
    let mut tasks = Vec::new();

    for i in 0..cli.requests {
        tokio::time::sleep_until(start + Duration::from_millis(i * cli.interval_ms)).await;
        let acquisition = cluster.acquire(None)?;
        let hold = Duration::from_millis(config.backends[acquisition.index()].hold_ms);
        let history = Arc::clone(&history);
        let failed = Arc::clone(&failed);
        let counts = Arc::clone(&counts);

        tasks.push(tokio::spawn(async move {
            match acquisition.await {
                Ok(lease) => {
                    counts[lease.backend].fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut history) = history.lock() {
                        history.push_str(&lease.backend.to_string());
                    }
                    tokio::time::sleep(hold).await;
                    lease.release();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "acquisition failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for task in tasks {
        task.await?;
    }

    let history = history.lock().map(|h| h.clone()).unwrap_or_default();
    let pools = cluster
        .pools()
        .iter()
        .enumerate()
        .map(|(index, pool)| PoolReport {
            name: pool.name().to_string(),
            acquisitions: counts[index].load(Ordering::Relaxed),
            created: pool.stats().created,
            create_failures: pool.stats().create_failures,
        })
        .collect();
    let report = Report {
        history,
        failed: failed.load(Ordering::Relaxed),
        pools,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("history: {}", report.history);
        println!("failed:  {}", report.failed);
        for pool in &report.pools {
            println!(
                "{:<12} acquisitions={:<4} created={:<4} create_failures={}",
                pool.name, pool.acquisitions, pool.created, pool.create_failures
            );
        }
    }

    Ok(())
}
