use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use deskhours::cli;
use deskhours::config::Config;
use deskhours::engine::{BusinessHours, WeeklyBusinessHours};
use deskhours::health::{run_health_server, ReconcileMetrics};
use deskhours::scheduler::{register_jobs, run_reconcile_loop};
use deskhours::seed;
use deskhours::store::{MemoryAgentStore, MemoryHourStore};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    if args.help {
        cli::print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deskhours=info".parse().unwrap()),
        )
        .init();

    info!("Deskhours business hours daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Reconcile interval: {}s", config.reconcile_interval_secs);
    if let Some(path) = &config.hours_file {
        info!("  Seed file: {}", path);
    }
    if let Some(port) = config.health_port {
        info!("  Health port: {}", port);
    }

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    // Wire the engine to its repositories
    let hour_store = Arc::new(MemoryHourStore::new());
    let agent_store = Arc::new(MemoryAgentStore::new());
    let engine: Arc<dyn BusinessHours> = Arc::new(WeeklyBusinessHours::new(
        hour_store.clone(),
        agent_store.clone(),
    ));

    // Seed records through the engine so they are validated on the way in
    if let Some(path) = &config.hours_file {
        let loaded = seed::load_file(path)?;
        let (hours, agents) = seed::apply(&loaded, engine.as_ref(), &agent_store).await?;
        info!("Seeded {} business hours and {} agents", hours, agents);
    }

    // Handle --once mode
    if args.once {
        info!("Running a single reconcile pass...");
        engine.open_business_hours_if_needed().await?;
        info!("Reconcile pass complete");
        return Ok(());
    }

    let metrics = Arc::new(ReconcileMetrics::new());
    let cancel_token = CancellationToken::new();

    // Health check server (optional)
    if let Some(port) = config.health_port {
        tokio::spawn(run_health_server(
            port,
            metrics.clone(),
            cancel_token.clone(),
        ));
    }

    // Cron triggers at each window boundary, in UTC
    let mut sched = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create job scheduler: {e}"))?;
    register_jobs(engine.clone(), &sched).await?;
    sched
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start job scheduler: {e}"))?;

    // Reconcile backstop loop
    let loop_handle = tokio::spawn(run_reconcile_loop(
        engine,
        Duration::from_secs(config.reconcile_interval_secs),
        metrics,
        cancel_token.clone(),
    ));

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    cancel_token.cancel();
    if let Err(e) = sched.shutdown().await {
        error!("Job scheduler shutdown failed: {}", e);
    }
    let _ = loop_handle.await;
    info!("Shutdown complete");

    Ok(())
}
