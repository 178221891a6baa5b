//! Cadence Job Scheduler - Main Entry Point
//!
//! Composition root: loads settings, migrates the schema and starts the
//! roles enabled for this process (api, claimer, reconciler).

mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence_api_rpc::rate_limiter::RateLimiter;
use cadence_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use cadence_core::application::worker::shutdown_channel;
use cadence_core::application::{
    BatchInserter, ClaimerConfig, DispatchResolver, DueJobClaimer, SequenceService, StatsService,
    StuckJobReconciler,
};
use cadence_core::port::{
    JobDispatcher, JobStore, MetricsSink, SystemTimeProvider, TimeProvider, TracingMetricsSink,
};
use cadence_infra_dispatch::{LogDispatcher, SubprocessConfig, SubprocessDispatcher};
use cadence_infra_postgres::{create_pool, run_migrations, PgJobStore};

use settings::{LogFormat, Role, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Cadence deferred job scheduler")]
struct Args {
    /// Settings file (TOML). Defaults to ./cadence.toml when present.
    #[arg(long, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let settings = Settings::load(args.config.as_deref()).context("Invalid configuration")?;

    // 2. Initialize logging
    init_logging(settings.log_format)?;
    info!(version = VERSION, roles = ?settings.roles, "Cadence starting...");

    // 3. Initialize database
    let pool = create_pool(&settings.database_url, settings.max_connections)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let metrics: Arc<dyn MetricsSink> = Arc::new(TracingMetricsSink);
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // 5. Start JSON-RPC server
    let rpc_handle = if settings.has_role(Role::Api) {
        let inserter = Arc::new(BatchInserter::new(
            store.clone(),
            metrics.clone(),
            settings.max_bind_params,
        ));
        let sequences = Arc::new(SequenceService::new(
            inserter,
            time_provider.clone(),
            settings.job_defaults()?,
        ));
        let stats = Arc::new(StatsService::new(store.clone()));
        let handler = Arc::new(RpcHandler::new(
            sequences,
            stats,
            RateLimiter::new(settings.rate_limit_burst, settings.rate_limit_per_sec),
        ));

        let rpc_config = RpcServerConfig {
            host: settings.rpc_host.clone(),
            port: settings.rpc_port,
        };
        let (addr, handle) = RpcServer::new(rpc_config, handler)
            .start()
            .await
            .context("RPC server start failed")?;
        info!(%addr, "JSON-RPC server listening");
        Some(handle)
    } else {
        None
    };

    // 6. Start claimers
    if settings.has_role(Role::Claimer) {
        let resolver = Arc::new(DispatchResolver::new(
            store.clone(),
            build_dispatcher(&settings),
            settings.dispatch_concurrency,
        ));
        let claimer_config = ClaimerConfig {
            batch_size: settings.claim_batch_size,
            lock_key: settings.claim_lock_key,
            ..ClaimerConfig::default()
        };

        for n in 0..settings.claimer_workers {
            let claimer = DueJobClaimer::new(
                format!("claimer-{n}"),
                store.clone(),
                resolver.clone(),
                metrics.clone(),
                time_provider.clone(),
                claimer_config.clone(),
            );
            let token = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = claimer.run(token).await {
                    error!(error = %e, "Claimer failed");
                }
            }));
        }
    }

    // 7. Start reconciler
    if settings.has_role(Role::Reconciler) {
        let reconciler = StuckJobReconciler::new(
            store.clone(),
            metrics.clone(),
            time_provider.clone(),
            settings.max_processing_time(),
        )
        .context("Reconciler setup failed")?;
        let token = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = reconciler.run(token).await {
                error!(error = %e, "Reconciler failed");
            }
        }));
    }

    info!("System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    wait_for_signal().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    if let Some(handle) = rpc_handle {
        if let Err(e) = handle.stop() {
            warn!(error = %e, "RPC server already stopped");
        }
    }

    let drain = drain_tasks(tasks);
    if tokio::time::timeout(settings.shutdown_timeout(), drain)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = settings.shutdown_timeout_secs,
            "Background loops did not stop in time"
        );
    }

    pool.close().await;
    info!("Shutdown complete.");
    Ok(())
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("cadence=info"))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}

fn build_dispatcher(settings: &Settings) -> Arc<dyn JobDispatcher> {
    match &settings.dispatch_command {
        Some(command) => {
            info!(command = %command, "Dispatching jobs to subprocess");
            Arc::new(SubprocessDispatcher::new(SubprocessConfig {
                command: command.clone(),
                args: settings.dispatch_args.clone(),
                env_allowlist: settings.dispatch_env_allowlist.clone(),
                working_dir: None,
                timeout: settings.dispatch_timeout(),
            }))
        }
        None => {
            info!("No dispatch command configured, jobs will only be logged");
            Arc::new(LogDispatcher)
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).context("SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Ctrl+C handler")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("Ctrl+C handler")?;
    Ok(())
}

async fn drain_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task panicked");
        }
    }
}
