use std::{sync::Arc, time::Duration};

use clap::Parser;
use cli::{Args, Commands};
use depot_config::{config_path, generate_default_config, utils::format_duration, Config};
use depot_core::{Indexer, IndexerOptions};
use depot_events::{EventSinkHandle, NullSink, StatsSink};
use depot_registry::{http_client::ClientConfig, open_store};
use error::Result;
use logging::setup_logging;
use server::{serve, watch_signals, AppState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use utils::set_color;

mod cli;
mod error;
mod handlers;
mod logging;
mod server;
mod utils;

fn build_indexer(
    config: &Config,
    events: EventSinkHandle,
    watch_interval: Duration,
) -> Result<Indexer> {
    let client = ClientConfig {
        user_agent: Some(config.user_agent()),
        timeout: Some(config.request_timeout()?).filter(|timeout| !timeout.is_zero()),
    };
    let store = open_store(&config.storage_api_url()?, &client)?;

    let options = IndexerOptions {
        package_storage_bucket_internal: config.package_storage_bucket_internal().to_string(),
        package_storage_endpoint: config.package_storage_endpoint().to_string(),
        watch_interval,
    };
    Ok(Indexer::new(store, options, events))
}

async fn run_server(config: Config, address: Option<String>) -> Result<()> {
    let watch_interval = config.watch_interval()?;
    let stats = Arc::new(StatsSink::default());
    let indexer = Arc::new(build_indexer(&config, stats.clone(), watch_interval)?);

    info!(
        bucket = %indexer.options().package_storage_bucket_internal,
        endpoint = %indexer.options().package_storage_endpoint,
        watch_interval = %format_duration(watch_interval),
        "Starting package index server"
    );

    let shutdown = CancellationToken::new();
    let watcher = indexer.init(shutdown.clone()).await?;
    tokio::spawn(watch_signals(shutdown.clone()));

    let state = AppState {
        indexer,
        stats,
        cache_time_index: config.cache_time_index()?,
        cache_time_artifacts: config.cache_time_artifacts()?,
    };
    let address = address.unwrap_or_else(|| config.address().to_string());
    let result = serve(&address, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(err) = watcher.await {
        error!("Index watcher stopped abnormally: {}", err);
    }
    debug!("Server stopped");
    result
}

async fn check(config: Config) -> Result<()> {
    let indexer = Arc::new(build_indexer(&config, Arc::new(NullSink), Duration::ZERO)?);
    indexer.init(CancellationToken::new()).await?;

    let snapshot = indexer.snapshot();
    info!(
        "Index at cursor {} contains {} packages",
        snapshot.cursor(),
        snapshot.len()
    );
    Ok(())
}

async fn handle_cli() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args)?;
    if args.no_color {
        set_color(false);
    }

    let path = config_path(args.config.as_deref());
    debug!("Using config file {}", path.display());

    match args.command {
        Commands::DefConfig => generate_default_config(&path)?,
        Commands::Check => check(Config::load(&path)?).await?,
        Commands::Serve {
            address,
        } => run_server(Config::load(&path)?, address).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
