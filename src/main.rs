use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

use bundlr::api::routes::{create_router, AppState};
use bundlr::config::Config;
use bundlr::observability::init_tracing;
use bundlr::policy::{PolicyLoader, RuleMatchCompiler, RuleMatchEvaluator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting bundlr bundle service"
    );

    // Load static policy modules and seed rules
    let loader = PolicyLoader::new(
        config.static_policy_dir.clone(),
        config.seed_rules.clone(),
    );
    let sources = loader.load_sources()?;
    let seed = loader.load_seed_rules()?;

    info!(modules = sources.len(), seed_rules = seed.len(), "Policy loaded");

    // Create application state
    let state = Arc::new(AppState::new(
        Arc::new(RuleMatchCompiler::new()),
        Arc::new(RuleMatchEvaluator::new()),
        sources,
        config.build_timeout(),
    ));

    for attrs in seed {
        state.rules.add(attrs)?;
    }

    // Build the initial bundle so a broken policy shows up at startup
    let (data, revision) = state.rules.get_all_serialized()?;
    let bundles = state.bundles.clone();
    match tokio::task::spawn_blocking(move || bundles.get_archive(&data, &revision)).await? {
        Ok(archive) => info!(size = archive.len(), "Initial bundle built"),
        Err(e) => error!(error = %e, "Initial bundle build failed"),
    }

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    if !config.graceful_shutdown {
        axum::serve(listener, app).await?;
        return Ok(());
    }

    // Run server with graceful shutdown, bounded by the shutdown timeout
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    info!("Shutting down...");
    let _ = stop_tx.send(true);

    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(res) => res??,
        Err(_) => warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Connections still open after shutdown timeout, exiting"
        ),
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
