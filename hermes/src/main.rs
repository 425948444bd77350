//! # Hermes Supervisor
//!
//! Command-line entry point for the Hermes simulation platform:
//! construct the backplane, spawn modules, stage, run the scheduler,
//! and shut everything down - with the IPC objects unlinked on every
//! exit path.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use hermes_backplane::{sweep_stale_objects, Backplane};
use hermes_common::config::{ExecutionMode, HermesConfig};
use hermes_core::{CoreError, FrameHook, ProcessManager, Scheduler};

/// Hermes - simulation orchestration platform.
#[derive(Debug, Parser)]
#[command(name = "hermes", version, about)]
struct Cli {
    /// Enable verbose (debug) output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a simulation from a configuration file.
    Run {
        /// Path to the YAML configuration file.
        config: PathBuf,
    },

    /// Validate a configuration file and print its contents.
    Validate {
        /// Path to the YAML configuration file.
        config: PathBuf,
    },

    /// List the signal directory of a live segment.
    #[command(name = "list-signals")]
    ListSignals {
        /// Shared memory segment name (e.g. "/hermes_12345").
        #[arg(long)]
        segment: String,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run { config } => run(&config, cli.quiet).await,
        Commands::Validate { config } => validate(&config),
        Commands::ListSignals { segment } => list_signals(&segment),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

// ─── run ────────────────────────────────────────────────────────────

/// Progress hook: log the clock every 100 frames.
struct ProgressHook {
    quiet: bool,
}

impl FrameHook for ProgressHook {
    fn on_frame(&mut self, frame: u64, time_ns: u64) {
        if !self.quiet && frame % 100 == 0 {
            info!(frame, time_s = time_ns as f64 / 1e9, "frame");
        }
    }
}

async fn run(config_path: &PathBuf, quiet: bool) -> Result<(), CoreError> {
    // Reclaim names a crashed coordinator may have left behind.
    let swept = sweep_stale_objects();
    if !swept.is_empty() {
        warn!(count = swept.len(), "swept stale IPC objects from a previous run");
    }

    info!(path = %config_path.display(), "loading configuration");
    let config = HermesConfig::load(config_path)?;
    info!(
        modules = config.modules.len(),
        signals = config.signal_count(),
        wires = config.wiring.len(),
        mode = %config.execution.mode,
        rate_hz = config.execution.rate_hz,
        "configuration loaded"
    );

    let mut pm = ProcessManager::new(&config)?;
    pm.spawn_all()?;

    let mut scheduler = Scheduler::new(pm, &config.execution);
    if let Err(e) = scheduler.stage() {
        scheduler.manager_mut().terminate_all();
        return Err(e);
    }

    if config.execution.mode == ExecutionMode::SingleFrame {
        info!("single_frame mode: frames advance only on external step requests");
    }

    // Ctrl-C / SIGTERM stop the loop; the in-flight frame completes.
    let handle = scheduler.handle();
    let signal_task = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, stopping simulation");
            handle.stop();
        }
    });

    let mut hook = ProgressHook { quiet };
    let result = scheduler.run(Some(&mut hook)).await;
    signal_task.abort();

    info!(
        frames = scheduler.frame(),
        time_s = scheduler.time_seconds(),
        "simulation complete"
    );

    scheduler.manager_mut().terminate_all();
    result
}

// ─── validate ───────────────────────────────────────────────────────

fn validate(config_path: &PathBuf) -> Result<(), CoreError> {
    let config = HermesConfig::load(config_path)?;

    println!(
        "configuration valid: {} modules, {} signals, {} wires, mode {}",
        config.modules.len(),
        config.signal_count(),
        config.wiring.len(),
        config.execution.mode,
    );
    for (name, module) in config.modules.iter() {
        println!("  module: {name}");
        for sig in &module.signals {
            let mut attrs = vec![sig.data_type.to_string()];
            if sig.writable {
                attrs.push("writable".to_string());
            }
            if sig.published {
                attrs.push("published".to_string());
            }
            if !sig.unit.is_empty() {
                attrs.push(format!("unit={}", sig.unit));
            }
            println!("    signal: {name}.{} ({})", sig.name, attrs.join(", "));
        }
    }
    for wire in &config.wiring {
        println!(
            "  wire: {} -> {} (gain={}, offset={})",
            wire.src, wire.dst, wire.gain, wire.offset
        );
    }
    Ok(())
}

// ─── list-signals ───────────────────────────────────────────────────

fn list_signals(segment: &str) -> Result<(), CoreError> {
    let backplane = Backplane::attach_read_only(segment)?;

    println!("segment: {}", backplane.name());
    println!("frame:   {}", backplane.frame());
    println!("time:    {:.3}s", backplane.time_ns() as f64 / 1e9);
    println!("signals: {}", backplane.signal_count());
    for row in backplane.dump() {
        let value = backplane.get_slot_value(row.slot);
        println!(
            "  [{:3}] {:<40} {:<5} flags={:#04x} offset={:<6} value={}",
            row.slot,
            row.name,
            row.data_type.to_string(),
            row.flags.bits(),
            row.offset,
            value,
        );
    }
    Ok(())
}
