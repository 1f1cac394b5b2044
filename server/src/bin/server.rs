//! Seat engine HTTP server.

use anyhow::Context;
use seat_engine_core::RegistrationEngine;
use seat_engine_core::environment::SystemClock;
use seat_engine_postgres::{PgIdentityStore, PgProfileStore, PgSeatStore};
use seat_engine_server::provider::HttpPaymentProvider;
use seat_engine_server::state::Engine;
use seat_engine_server::{AppState, Config, PgBackend, build_router, init_tracing, metrics};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&config.server.log_format);
    info!("Starting seat engine HTTP server");

    // Metrics
    metrics::register_business_metrics();
    if config.server.metrics_enabled {
        let addr: SocketAddr = config
            .metrics_address()
            .parse()
            .context("Invalid metrics address")?;
        metrics::install_exporter(addr)?;
    }

    // Store
    info!("Connecting to database...");
    let store = Arc::new(PgSeatStore::connect_with(&config.postgres.url, config.postgres.pool_options()).await?);
    if config.postgres.run_migrations {
        store.migrate().await?;
        info!("Migrations applied");
    }
    info!("Database connected");

    // Engine
    let provider = Arc::new(HttpPaymentProvider::new(&config.payment)?);
    let identities = Arc::new(PgIdentityStore::new(store.pool().clone()));
    let profiles = Arc::new(PgProfileStore::new(store.pool().clone()));
    let engine: Arc<Engine<PgBackend>> = Arc::new(RegistrationEngine::new(
        Arc::clone(&store),
        provider,
        identities,
        profiles,
        Arc::new(SystemClock),
        config.registration.engine_config()?,
    ));

    if config.server.expiry_sweep_interval > 0 {
        spawn_expiry_sweep(Arc::clone(&engine), Duration::from_secs(config.server.expiry_sweep_interval));
    }

    let state = AppState::<PgBackend>::new(engine, store, &config.payment.webhook_signature_header);
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let shutdown = Arc::new(Notify::new());
    let serve = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server stopped");
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    shutdown.notify_one();
    match tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), server).await {
        Ok(result) => result??,
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server stopped");
    Ok(())
}

/// Periodically move lapsed ACTIVE seats to EXPIRED.
fn spawn_expiry_sweep(engine: Arc<Engine<PgBackend>>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match engine.expire_due().await {
                Ok(expired) if !expired.is_empty() => info!(count = expired.len(), "Expired seats"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
