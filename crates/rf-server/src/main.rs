//! RouteFlow server entry point.

use anyhow::Context;
use clap::Parser;
use rf_ipc::{IpcService, MemoryBus};
use rf_server::config::DEFAULT_CONFIG_PATH;
use rf_server::{Backend, Dispatcher, RfServer, RfServerConfig, StaticConfig, Tables};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// RouteFlow coordination server
#[derive(Parser, Debug)]
#[command(name = "rfserver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// VM/DP port configuration, overrides the settings file
    #[arg(short = 'f', long)]
    rfconfig: Option<PathBuf>,

    /// ISL configuration, overrides the settings file
    #[arg(short = 'i', long)]
    islconf: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), unless RUST_LOG is set
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Keep the association and ISL tables from a previous run
    #[arg(long)]
    no_clear: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    match run(args).await {
        Ok(()) => {
            info!("rfserver: exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("rfserver: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RfServerConfig::load_or_default(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))?;
    if let Some(path) = args.rfconfig {
        config.files.config_csv = path;
    }
    if let Some(path) = args.islconf {
        config.files.isl_csv = Some(path);
    }
    if args.no_clear {
        config.server.clear_tables_on_start = false;
    }
    config.validate().context("invalid settings")?;
    let config = Arc::new(config);

    let static_config = StaticConfig::load(&config.files.config_csv, config.files.isl_csv.as_deref())
        .with_context(|| {
            format!(
                "failed to load static config from {}",
                config.files.config_csv.display()
            )
        })?;

    let (ipc, tables) = connect(&config).await?;
    info!(
        id = ipc.id(),
        backend = ?config.transport.backend,
        "rfserver: starting"
    );

    let server = RfServer::new(Arc::clone(&config), Arc::new(static_config), Arc::clone(&ipc), tables);
    server
        .initialize()
        .await
        .context("failed to initialize tables")?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("rfserver: received SIGINT, shutting down"),
            Err(e) => error!("rfserver: failed to listen for ctrl-c: {}", e),
        }
    };

    let stats = Dispatcher::new(server, ipc)
        .run(shutdown)
        .await
        .context("dispatcher failed")?;
    info!(processed = stats.processed, failed = stats.failed, "rfserver: stopped");
    Ok(())
}

async fn connect(config: &RfServerConfig) -> anyhow::Result<(Arc<dyn IpcService>, Tables)> {
    let id = config.server.id.clone();
    match config.transport.backend {
        Backend::Memory => {
            warn!("rfserver: memory backend, no other component can reach this server");
            let ipc: Arc<dyn IpcService> = Arc::new(MemoryBus::new().service(id));
            Ok((ipc, Tables::in_memory()))
        }
        #[cfg(feature = "redis")]
        Backend::Redis => {
            let transport = &config.transport;
            let mut ipc_config = rf_ipc::RedisIpcConfig::new(
                transport.redis_host.clone(),
                transport.redis_port,
                transport.redis_db,
            );
            ipc_config.poll_timeout_secs = transport.poll_timeout_secs;
            let ipc = rf_ipc::RedisIpc::connect(id, ipc_config)
                .await
                .context("failed to connect IPC to Redis")?;

            let table_config = rf_table::RedisTableConfig::new(
                transport.redis_host.clone(),
                transport.redis_port,
                transport.redis_db,
            );
            let tables = Tables::connect_redis(&table_config)
                .await
                .context("failed to connect tables to Redis")?;
            let ipc: Arc<dyn IpcService> = Arc::new(ipc);
            Ok((ipc, tables))
        }
        #[cfg(not(feature = "redis"))]
        Backend::Redis => anyhow::bail!("built without Redis support"),
    }
}
