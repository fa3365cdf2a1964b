//! smartmon - storage health monitor
//!
//! Watches local drives through two sources:
//! - the smartd journal (backlog scan + live follow) for failure reports
//! - smartctl attribute snapshots per device, on demand
//!
//! and keeps one reconciled health status, re-checked on a fixed interval.

mod capabilities;
mod config;
mod disks;
mod execution;
mod journal;
mod monitor;
mod scheduler;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smartmon_core::{CommandRunner, MonitorConfig, PrivilegedAction};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::disks::{render_table, DiskPoller};
use crate::execution::{CommandExecutor, SystemRunner};
use crate::monitor::{log_summary_changes, Monitor};

#[derive(Parser)]
#[command(name = "smartmon", version, about = "Storage health monitor for smartmontools hosts")]
struct Cli {
    /// Config file (defaults to $SMARTMON_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until Ctrl-C or SIGTERM
    Run,
    /// Show SMART attributes of every device
    Disks {
        #[arg(long)]
        json: bool,
    },
    /// One environment check and one backlog scan
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Start or stop the smartd service
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Install smartmontools
    Install,
    /// Write the default configuration file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    ConfigPath,
}

#[derive(Subcommand, Clone, Copy)]
enum ServiceAction {
    Start,
    Stop,
}

impl From<ServiceAction> for PrivilegedAction {
    fn from(action: ServiceAction) -> Self {
        match action {
            ServiceAction::Start => PrivilegedAction::StartService,
            ServiceAction::Stop => PrivilegedAction::StopService,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smartmon=info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path()?,
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
        Commands::InitConfig { force } => init_config(&config_path, force).await,
        command => {
            let config = Arc::new(config::load_from(&config_path).await?);
            let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
            match command {
                Commands::Disks { json } => show_disks(runner.as_ref(), &config, json).await,
                Commands::Check { json } => check_once(runner, config, json).await,
                Commands::Service { action } => run_action(runner.as_ref(), &config, action.into()).await,
                Commands::Install => run_action(runner.as_ref(), &config, PrivilegedAction::InstallPackage).await,
                _ => run_monitor(runner, config).await,
            }
        }
    }
}

async fn run_monitor(runner: Arc<dyn CommandRunner>, config: Arc<MonitorConfig>) -> Result<()> {
    let host = gethostname::gethostname().to_string_lossy().to_string();
    info!("🩺 smartmon starting on {}", host);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let monitor = Monitor::new(runner, config, shutdown_rx.clone());
    let summaries = tokio::spawn(log_summary_changes(monitor.subscribe(), shutdown_rx));

    let result = monitor.run().await.context("Monitor execution failed");
    if let Err(e) = summaries.await {
        warn!("Summary logger failed: {}", e);
    }
    result
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Ctrl-C handler unavailable: {}", e);
            }
        }
    }
}

async fn show_disks(runner: &dyn CommandRunner, config: &MonitorConfig, json: bool) -> Result<()> {
    let records = DiskPoller::new(runner, config).poll_all().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No devices found");
    } else {
        println!("{}", render_table(&records));
    }
    Ok(())
}

async fn check_once(runner: Arc<dyn CommandRunner>, config: Arc<MonitorConfig>, json: bool) -> Result<()> {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitor = Monitor::new(runner, config, shutdown_rx);
    monitor.check_environment().await;
    monitor.full_check().await;

    let snapshot = monitor.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", snapshot.summary());
    }
    Ok(())
}

async fn run_action(runner: &dyn CommandRunner, config: &MonitorConfig, action: PrivilegedAction) -> Result<()> {
    let result = CommandExecutor::execute_action(runner, config, action).await;
    if result.success {
        println!("✅ {}", result.command);
    } else {
        println!(
            "❌ {} failed: {}",
            result.command,
            result.error.as_deref().unwrap_or("non-zero exit status")
        );
    }
    Ok(())
}

async fn init_config(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_to(&MonitorConfig::default(), path).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
