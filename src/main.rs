use sitemap_warmer::cli::{Cli, Commands};
use sitemap_warmer::config::{ConfigError, Settings};
use sitemap_warmer::dispatch::DispatchError;
use sitemap_warmer::logging::init_logging_in_data_dir;
use sitemap_warmer::models::RunMode;
use sitemap_warmer::network::{FetchError, Fetcher, HttpClient};
use sitemap_warmer::orchestration::{build_cycle, setup_shutdown_handler, CycleError, WarmingCycle};
use sitemap_warmer::scheduler::run_scheduler;
use sitemap_warmer::server::{serve, AppState};
use sitemap_warmer::state::{KvStore, RedbStore, StateError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] FetchError),

    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Warming run failed: {0}")]
    Cycle(#[from] CycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bind address '{0}'")]
    Bind(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

fn build_cycle_for(data_dir: &str) -> Result<Arc<WarmingCycle>, MainError> {
    let settings = Settings::from_env()?;
    let store: Arc<dyn KvStore> = Arc::new(RedbStore::new(data_dir)?);
    let http: Arc<dyn Fetcher> = Arc::new(HttpClient::new(
        settings.user_agent.clone(),
        settings.timeout_secs,
    )?);

    if settings.sitemaps.is_empty() {
        tracing::warn!("WARMER_SITEMAPS is empty, runs will warm nothing");
    }

    Ok(Arc::new(build_cycle(settings, store, http)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), MainError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_serve_command(
    cycle: Arc<WarmingCycle>,
    bind: String,
    no_schedule: bool,
) -> Result<(), MainError> {
    let addr: SocketAddr = bind.parse().map_err(|_| MainError::Bind(bind.clone()))?;
    let shutdown = setup_shutdown_handler();

    let scheduler = if no_schedule {
        None
    } else {
        let period = cycle.settings().schedule_interval;
        tracing::info!(interval_secs = period.as_secs(), "Scheduler enabled");
        Some(tokio::spawn(run_scheduler(
            Arc::clone(&cycle),
            period,
            shutdown.clone(),
        )))
    };

    serve(AppState::new(cycle), addr, shutdown).await?;

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse_args();

    let _log_guards =
        init_logging_in_data_dir(&cli.data_dir).map_err(|e| MainError::Logging(e.to_string()))?;

    let cycle = build_cycle_for(&cli.data_dir)?;

    match cli.command {
        Commands::Serve { bind, no_schedule } => {
            run_serve_command(cycle, bind, no_schedule).await?;
        }

        Commands::Run { test } => {
            let mode = if test { RunMode::Test } else { RunMode::Full };
            let result = cycle.run(mode).await?;
            print_json(&result)?;
        }

        Commands::Status => {
            print_json(&cycle.results().get_status())?;
        }

        Commands::History { region, limit } => {
            print_json(&cycle.results().get_history(region.as_deref(), limit))?;
        }

        Commands::ResetRegion => {
            cycle.reset_region()?;
            println!("Region rotation reset; next run starts at the first region");
        }

        Commands::Discover { show } => {
            let catalog = cycle.discover().await;
            println!("Discovered {} URLs", catalog.len());
            for url in catalog.iter().take(show) {
                println!("  {}", url);
            }
        }
    }

    Ok(())
}
