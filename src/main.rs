use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use teelog::{tee_eprintln, tee_print, tee_println};
use teelog::{OutputRegistry, TeeConfig};

const DEFAULT_CONFIG_FILE: &str = "teelog.toml";

fn main() -> Result<()> {
    // Diagnostics go to the real stderr, never through the registry
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "teelog=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = TeeConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let registry = OutputRegistry::global();
    let handle = teelog::install(&config, &registry).context("Failed to install output tee")?;

    if let Some(path) = handle.current_log_path() {
        tee_println!("Logging to: {}", path.display());
    }

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            thread::spawn(move || {
                for step in 0..3 {
                    tee_println!("worker {} finished step {}", worker, step);
                }
            })
        })
        .collect();
    for worker in workers {
        if worker.join().is_err() {
            tee_eprintln!("a worker thread panicked");
        }
    }

    tee_eprintln!("stderr output is teed as well");
    tee_print!("exiting without a trailing newline");

    handle.uninstall();
    println!();
    Ok(())
}
