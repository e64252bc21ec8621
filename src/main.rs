use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use slotpost::config::Config;
use slotpost::publisher::Publisher;
use slotpost::scheduler::Scheduler;
use slotpost::state::AppState;
use slotpost::transport::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Missing destination or credentials: nothing gets processed.
    let config = Config::from_env().map_err(|e| format!("Configuration error: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting slotpost (target {})", config.target);

    let pool = slotpost::db::connect(&config.database_url).await?;
    tracing::info!("Queue store ready at {}", config.database_url);

    let telegram = Arc::new(TelegramClient::new(&config.bot_token)?);
    let publisher = Arc::new(Publisher::new(
        pool.clone(),
        telegram.clone(),
        config.target.clone(),
    ));
    let scheduler = Scheduler::new(config.slots.clone(), config.timezone, publisher);

    let http_addr = config.http_addr;
    let state = Arc::new(AppState { pool, config });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let slot_tasks = scheduler.spawn(shutdown_rx.clone());
    let poller = tokio::spawn(slotpost::ingest::telegram::run(
        state.clone(),
        telegram,
        shutdown_rx.clone(),
    ));

    let server = match http_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Admin API listening on {addr}");
            let app = slotpost::build_app(state.clone());
            let mut rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = rx.wait_for(|stop| *stop).await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!("Admin API stopped: {e}");
                }
            }))
        }
        None => None,
    };

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // Slot tasks finish any delivery already in progress before exiting.
    futures_util::future::join_all(slot_tasks).await;
    let _ = poller.await;
    if let Some(server) = server {
        let _ = server.await;
    }

    state.pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
