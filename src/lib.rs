// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::Config;
use crate::config::loader::load_and_validate;
use crate::engine::Orchestrator;
use crate::report::{Reporter, TerminalReporter};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (defaults when the file is missing)
/// - the orchestrator with the production builder and supervisor
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config = load_and_validate(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;

    if args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    start(config).await?;
    Ok(())
}

/// Run the loop until a termination signal arrives.
///
/// Returns early only on a fatal startup error.
pub async fn start(config: Config) -> errors::Result<()> {
    start_with_reporter(config, Arc::new(TerminalReporter::detect())).await
}

pub async fn start_with_reporter(config: Config, reporter: Arc<dyn Reporter>) -> errors::Result<()> {
    info!(root = ?config.root(), bin = %config.bin(), "starting devloop");
    Orchestrator::from_config(config, reporter).start().await
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(config: &Config) {
    println!("devloop dry-run");
    println!("  root = {}", config.root().display());
    println!("  tmp_dir = {}", config.tmp_dir().display());
    println!("  bin = {}", config.bin());
    println!("  build_cmd = {}", config.build_cmd());
    println!("  debounce_ms = {}", config.debounce().as_millis());
    println!("  grace_period_ms = {}", config.grace_period().as_millis());
    match config.poll_interval() {
        Some(interval) => println!("  watcher = polling every {} ms", interval.as_millis()),
        None => println!("  watcher = native"),
    }
    println!();

    println!("watch_dirs ({}):", config.watch_dirs().len());
    for dir in config.watch_dirs() {
        println!("  - {}", dir.display());
    }
    println!("exclude: {:?}", config.exclude());
    println!("extensions: {:?}", config.extensions());

    debug!("dry-run complete (no execution)");
}
