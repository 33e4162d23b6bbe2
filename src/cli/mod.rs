/*
* Telemetry Analytics Command Line Interface
* ------------------------------------------
*
* telemetry-analytics
* ├── serve [--port]        // run the HTTP service
* ├── simulate              // push a synthetic stream through an in-process engine
* └── init [--force]        // write config/default.toml
*
* Every command accepts --config DIR to point at a configuration directory
* instead of $CONFIG_PATH (or ./config).
*/

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Settings;
use crate::monitoring::engine::AnalyticsEngine;
use crate::monitoring::sample::Sample;
use crate::monitoring::window::Snapshot;
use crate::utils::unix_now;

#[derive(Parser)]
#[command(name = "telemetry-analytics")]
#[command(about = "Streaming rps analytics with z-score anomaly detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Feed a synthetic telemetry stream through the engine and print the result
    Simulate {
        #[arg(short, long, default_value_t = 1_000)]
        samples: usize,
        /// Inject a spike every N samples (0 disables spikes)
        #[arg(short, long, default_value_t = 20)]
        anomaly_every: usize,
        #[arg(short, long, default_value_t = 100)]
        devices: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::new_from_file(path)?,
        None => Settings::new()?,
    };

    match cli.command {
        Commands::Serve { port } => {
            let server_port = port.unwrap_or(settings.server.port);
            info!("Starting server on port {}", server_port);
            crate::server::run_server(settings, server_port).await?;
        }
        Commands::Simulate {
            samples,
            anomaly_every,
            devices,
            seed,
        } => {
            handle_simulate_command(&settings, samples, anomaly_every, devices.max(1), seed).await?;
        }
        Commands::Init { force } => {
            handle_init_command(cli.config.unwrap_or_else(|| PathBuf::from("config")), force)?;
        }
    }

    Ok(())
}

const BASE_RPS: f64 = 100.0;
const JITTER_STD_DEV: f64 = 15.0;
const DROP_CEILING_RPS: f64 = 10.0;

/// Mirrors the load generator: base rps around 100 with gaussian jitter,
/// plus a large spike or a drop towards zero every `anomaly_every` samples.
pub struct SyntheticStream {
    rng: StdRng,
    jitter: Normal<f64>,
    devices: usize,
    anomaly_every: usize,
    emitted: usize,
}

impl SyntheticStream {
    pub fn new(seed: u64, devices: usize, anomaly_every: usize) -> Result<Self> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            jitter: Normal::new(BASE_RPS, JITTER_STD_DEV)?,
            devices,
            anomaly_every,
            emitted: 0,
        })
    }
}

impl Iterator for SyntheticStream {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        self.emitted += 1;
        let device = self.rng.gen_range(1..=self.devices);
        let spike = self.anomaly_every > 0 && self.emitted % self.anomaly_every == 0;

        let rps: f64 = if spike {
            if self.rng.gen_bool(0.5) {
                BASE_RPS + self.rng.gen_range(150.0f64..300.0)
            } else {
                self.rng.gen_range(0.0..DROP_CEILING_RPS)
            }
        } else {
            self.jitter.sample(&mut self.rng).max(0.0)
        };

        Some(Sample::new(
            format!("device_{}", device),
            unix_now(),
            self.rng.gen_range(0.0..100.0),
            rps,
        ))
    }
}

async fn handle_simulate_command(
    settings: &Settings,
    samples: usize,
    anomaly_every: usize,
    devices: usize,
    seed: u64,
) -> Result<()> {
    let engine = AnalyticsEngine::start(settings.analytics_config())?;
    let queue_capacity = settings.analytics.queue_capacity.max(1);

    for (i, sample) in SyntheticStream::new(seed, devices, anomaly_every)?
        .take(samples)
        .enumerate()
    {
        engine.enqueue(sample);
        // give the dispatcher a chance before the queue fills up
        if (i + 1) % queue_capacity == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    // stop does not drain the queue, so wait for everything accepted to land
    while engine.snapshot().await.total_processed < engine.ingest_stats().accepted {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.shutdown().await;

    let stats = engine.ingest_stats();
    print_snapshot(&engine.snapshot().await, stats.accepted, stats.dropped);
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, accepted: u64, dropped: u64) {
    println!("{}", "Analytics snapshot:".bold());
    println!("  window size      {}", snapshot.window_capacity);
    println!("  rolling average  {:.2}", snapshot.rolling_average);
    println!("  mean             {:.2}", snapshot.mean);
    println!("  std dev          {:.2}", snapshot.std_dev);
    println!("  processed        {}", snapshot.total_processed);

    let anomalies = format!(
        "{} ({:.2}%)",
        snapshot.anomaly_count,
        snapshot.anomaly_rate()
    );
    if snapshot.anomaly_count > 0 {
        println!("  anomalies        {}", anomalies.yellow());
    } else {
        println!("  anomalies        {}", anomalies.green());
    }

    let ingest = format!("{} accepted, {} dropped", accepted, dropped);
    if dropped > 0 {
        println!("  ingest           {}", ingest.red());
    } else {
        println!("  ingest           {}", ingest.green());
    }
}

fn handle_init_command(config_dir: PathBuf, force: bool) -> Result<()> {
    let target = config_dir.join("default.toml");
    if target.exists() && !force {
        error!("{} already exists. Use --force to overwrite.", target.display());
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = crate::config::generate_default_config();
    let config_str = toml::to_string_pretty(&default_config)?;
    std::fs::write(&target, config_str)?;

    println!("{} Default configuration written to {}", "✓".green(), target.display());
    Ok(())
}
