use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use innkeep::api::{AppState, build_router};
use innkeep::auth::JwtIdentity;
use innkeep::config::Config;
use innkeep::engine::Engine;
use innkeep::payment::MomoGateway;
use innkeep::sweeper::{run_compactor, run_sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    innkeep::observability::init_tracing();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(config.wal_path())?);

    tokio::spawn(run_sweeper(
        engine.clone(),
        config.sweep_interval,
        config.pending_ttl,
    ));
    tokio::spawn(run_compactor(engine.clone(), config.compact_threshold));

    let state = AppState {
        engine,
        identity: Arc::new(JwtIdentity::new(&config.jwt_secret)),
        gateway: Arc::new(MomoGateway::new(config.payment.clone())?),
    };
    let app = build_router(state, Some(&config.frontend_url));

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  sweeper: every {}s, pending ttl {}s",
        config.sweep_interval.as_secs(),
        config.pending_ttl.as_secs()
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("innkeep stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
