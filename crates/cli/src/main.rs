//! texer - report changes to LaTeX sources by polling

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use watcher::{IgnoreSet, Watcher};

mod config;
mod report;

/// texer - watch a directory of LaTeX sources without OS notifications
#[derive(Parser)]
#[command(name = "texer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root path to watch (repeatable)
    #[arg(short, long = "path", default_value = "./")]
    paths: Vec<PathBuf>,

    /// Polling interval in milliseconds (default: 50)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Only report files ending in this suffix (repeatable, default: .tex)
    #[arg(short, long = "suffix")]
    suffixes: Vec<String>,

    /// Config file (default: ./.texer.toml, then ~/.texer.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let (mut config, source) = config::load(cli.config.as_deref())?;
    config.apply_overrides(cli.interval, &cli.suffixes);

    let rules = IgnoreSet::load(&cli.paths, &config.ignore)
        .context("Failed to load ignore rules")?;
    let watcher = Watcher::new(config.watch.clone(), rules);
    for path in &cli.paths {
        watcher
            .add(path.clone())
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let mut events = watcher.events().context("Event stream already taken")?;
    let mut errors = watcher.errors().context("Error stream already taken")?;

    watcher.start().context("Failed to start watcher")?;
    report::banner(&cli.paths, watcher.interval(), source.as_ref());

    let started = Instant::now();
    let mut tally = report::Tally::default();
    let mut stopping = false;

    // Runs until both streams have closed after stop
    loop {
        tokio::select! {
            res = signal::ctrl_c(), if !stopping => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down");
                stopping = true;
                watcher.stop()?;
            }
            Some(event) = events.recv() => {
                tally.record(&event);
                report::event(&event);
            }
            Some(err) = errors.recv() => {
                tally.errors += 1;
                report::error(&err);
            }
            else => break,
        }
    }

    report::summary(&tally, started.elapsed());
    Ok(())
}
