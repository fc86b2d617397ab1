use anyhow::{Context, bail};
use clap::Parser;
use filer_gate::api;
use filer_gate::config::Config;
use filer_gate::remote::coordinator::Coordinator;
use filer_gate::remote::{MountRegistry, MountTable};
use filer_gate::storage::driver::filesystem::FilesystemChunkStore;
use filer_gate::storage::driver::memory::InMemoryMetaStore;
use filer_gate::storage::{ChunkStore, MetaStore};
use filer_gate::utils::cli::Args;
use filer_gate::utils::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
#[cfg(unix)]
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await?;

    let meta: Arc<dyn MetaStore> = Arc::new(InMemoryMetaStore::new());
    let chunks: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(&config.root_dir));

    let table = load_mounts(&config)?;
    tracing::info!("loaded {} remote mounts", table.len());
    let mounts = Arc::new(MountRegistry::new(table));

    let coordinator = Arc::new(Coordinator::new(
        meta.clone(),
        chunks.clone(),
        config.max_chunk_size,
    ));
    pull_mounts(&coordinator, &mounts.snapshot()).await;

    let state = Arc::new(AppState::new(
        config.clone(),
        meta,
        chunks,
        mounts.clone(),
        coordinator.clone(),
    ));

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    #[cfg(unix)]
    tokio::spawn(reload_on_sighup(
        config.clone(),
        mounts,
        coordinator,
        state.shutdown.clone(),
    ));

    if let Some(port) = config.readonly_port {
        let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, port)).await?;
        tracing::info!("read-only listening on {}", listener.local_addr()?);
        let app = api::create_router(state.clone(), true);
        let token = state.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                tracing::error!("read-only server failed: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    let app = api::create_router(state.clone(), config.read_only);
    axum::serve(listener, app)
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down...");
}

fn load_mounts(config: &Config) -> anyhow::Result<MountTable> {
    match &config.remote_mounts {
        Some(path) => MountTable::from_file(path)
            .with_context(|| format!("loading remote mounts from {}", path.display())),
        None => Ok(MountTable::default()),
    }
}

async fn pull_mounts(coordinator: &Coordinator, table: &MountTable) {
    for mapping in table.mappings() {
        let Some(conf) = table.conf(&mapping.remote_mounted_location.name) else {
            continue;
        };
        if let Err(e) = coordinator.pull_mount(mapping, &conf).await {
            tracing::warn!(
                "failed to pull remote entries into {}: {}",
                mapping.local_mounted_dir,
                e
            );
        }
    }
}

/// Re-reads the mounts file on SIGHUP and swaps the table in whole. A file
/// that fails validation leaves the current table in place.
#[cfg(unix)]
async fn reload_on_sighup(
    config: Config,
    mounts: Arc<MountRegistry>,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("SIGHUP reload disabled: {}", e);
            return;
        }
    };
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = hangup.recv() => {
                if received.is_none() {
                    return;
                }
            }
        }
        match load_mounts(&config) {
            Ok(table) => {
                let old = mounts.replace(table);
                let new = mounts.snapshot();
                tracing::info!("reloaded remote mounts: {} -> {}", old.len(), new.len());
                pull_mounts(&coordinator, &new).await;
            }
            Err(e) => tracing::error!("keeping current remote mounts: {:#}", e),
        }
    }
}

async fn validate_config(args: &Args) -> anyhow::Result<Config> {
    let mut validation_errors = Vec::new();

    match tokio::fs::metadata(&args.root).await {
        Ok(meta) => {
            if !meta.is_dir() {
                validation_errors.push(format!(
                    "FILER_ROOTDIR `{}` exists but is not a directory",
                    args.root.display(),
                ));
            }
        }
        Err(_) => validation_errors.push(format!(
            "FILER_ROOTDIR `{}` does not exist.",
            args.root.display(),
        )),
    }

    if args.max_chunk_size == 0 {
        validation_errors.push("FILER_MAX_CHUNK_SIZE must be positive".to_string());
    }
    if args.readonly_port == Some(args.port) {
        validation_errors.push(format!(
            "FILER_READONLY_PORT `{}` is the same as FILER_PORT",
            args.port
        ));
    }
    if let Some(path) = &args.remote_mounts {
        if !path.is_file() {
            validation_errors.push(format!(
                "FILER_REMOTE_MOUNTS `{}` is not a file",
                path.display()
            ));
        }
    }
    if args.volume_server_url.is_none() {
        tracing::warn!("FILER_VOLUME_SERVER_URL is not set; chunk proxy requests will fail");
    }
    if args.concurrent_upload_limit != 0 && args.admission_timeout_ms.is_none() {
        tracing::warn!("uploads may wait for admission indefinitely; set FILER_ADMISSION_TIMEOUT_MS to bound it");
    }

    if !validation_errors.is_empty() {
        bail!("{}", validation_errors.join("\n"));
    }

    Ok(Config {
        host: args.host.clone(),
        port: args.port,
        readonly_port: args.readonly_port,
        read_only: args.read_only,
        root_dir: args.root.clone(),
        concurrent_upload_limit: args.concurrent_upload_limit,
        admission_timeout: args.admission_timeout_ms.map(Duration::from_millis),
        hydration_timeout: args.hydration_timeout_ms.map(Duration::from_millis),
        max_chunk_size: args.max_chunk_size,
        remote_mounts: args.remote_mounts.clone(),
        volume_server_url: args.volume_server_url.clone(),
    })
}
