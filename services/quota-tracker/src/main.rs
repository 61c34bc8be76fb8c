use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::serve;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use guardrails_quota_tracker::{
    create_router, open_store, ApiState, QuotaTracker, QuotaTrackerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = QuotaTrackerConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        host = %config.server_host,
        port = config.server_port,
        store = %config.store,
        data_dir = %config.data_dir.display(),
        daily_limit = config.daily_limit,
        gate_mode = %config.gate_mode,
        "starting quota-tracker service"
    );

    let store = open_store(&config).context("failed to open quota store")?;
    let tracker = QuotaTracker::from_config(store, &config);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid server bind address")?;

    let state = Arc::new(ApiState::new(tracker, config));
    let router = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!(%local_addr, "quota-tracker listening");

    serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server encountered an unrecoverable error")?;

    info!("quota-tracker service shutting down");
    Ok(())
}

fn init_tracing(config: &QuotaTrackerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
