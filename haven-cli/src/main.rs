use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use error::AppError;
use haven_engine::{
    CacheEngine, CacheStorage, ConfigLoader, EngineOptions, EventOutcome, HttpFetcher, LocalHost,
    MemoryStorage, Request, TieredStorage, WorkerEvent,
};
use mimalloc::MiMalloc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use url::Url;

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::{format_bytes, parse_headers};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&args.log_file)?;
    let (file_writer, _log_guard) = tracing_appender::non_blocking(log_file);

    let multi_writer = MakeWriterExt::and(std::io::stdout, file_writer);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("Haven - offline-capable request cache");
    info!("==================================================================");

    let origin = Url::parse(&args.origin)
        .map_err(|e| AppError::InvalidInput(format!("Invalid origin '{}': {e}", args.origin)))?;

    let mut options = EngineOptions::builder(origin.clone())
        .with_config_path(args.config_path.clone())
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_system_proxy(!args.no_proxy)
        .build();
    options.precache_urls.extend(args.precache.iter().cloned());
    options.http.headers.extend(parse_headers(&args.headers));

    info!(
        "HTTP timeout configuration: overall={}s, connect={}s",
        args.timeout, args.connect_timeout
    );

    let storage: Arc<dyn CacheStorage> = if args.memory {
        info!("Using in-memory cache store");
        Arc::new(MemoryStorage::new())
    } else {
        info!(dir = %args.storage_dir.display(), "Using persistent cache store");
        Arc::new(TieredStorage::new(&args.storage_dir))
    };

    let fetcher = HttpFetcher::with_options(&options.http, origin.clone())
        .map_err(|e| AppError::Initialization(e.to_string()))?;
    let host = Arc::new(LocalHost::new());
    let engine = CacheEngine::new(options, storage, Arc::new(fetcher), host.clone())?;

    let state = match &args.config_file {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration from file");
            engine.apply_config(ConfigLoader::from_file(path).await?)
        }
        None => engine.initialize().await,
    };
    info!(
        version = %state.config().cache_version(),
        groups = ?state.router().strategy_names(),
        "Configuration ready"
    );

    if args.skip_lifecycle {
        info!("Skipping install and activate");
    } else {
        engine.handle_event(WorkerEvent::Install).await?;
        if let EventOutcome::Activated(report) = engine.handle_event(WorkerEvent::Activate).await? {
            info!(
                deleted = ?report.deleted,
                failed = report.failed.len(),
                claimed = host.claimed(),
                "Worker active"
            );
            for (generation, e) in &report.failed {
                warn!(generation = %generation, error = %e, "Old generation left behind");
            }
        }
    }

    for path in &args.paths {
        let url = origin
            .join(path)
            .map_err(|e| AppError::InvalidInput(format!("Invalid path '{path}': {e}")))?;
        let request = if args.navigate {
            Request::navigate(url)
        } else {
            Request::get(url)
        };

        let response = engine.handle_fetch(&request).await;
        info!(
            path = %path,
            status = response.status().as_u16(),
            source = %response.source(),
            content_type = response.content_type().unwrap_or("-"),
            size = %format_bytes(response.body().len() as u64),
            "Served"
        );
    }

    Ok(())
}
