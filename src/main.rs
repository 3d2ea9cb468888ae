use std::sync::Arc;

use fileonce::ApiError;
use fileonce::config::Config;
use fileonce::router;
use fileonce::scheduler::{DeletionWorker, ExpiredSweep};
use fileonce::state::AppState;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fileonce=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let state = AppState::new(config.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // Deletion workers
    let settings = config.worker.settings();
    for id in 0..config.worker.workers.max(1) {
        let worker = DeletionWorker::new(id, state.scheduler.clone(), settings.clone());
        tasks.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }

    // Sweep of records whose job was lost
    let sweep = ExpiredSweep::new(
        state.scheduler.clone(),
        Arc::clone(&state.metadata),
        time::Duration::seconds(config.files.sweep_grace_seconds as i64),
        config.files.sweep_batch_size,
    );
    tasks.push(tokio::spawn(sweep.run(
        std::time::Duration::from_secs(config.files.sweep_interval_seconds),
        shutdown_rx.clone(),
    )));

    let app = router::create_router(state).layer(TraceLayer::new_for_http());

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .map_err(|e| ApiError::new(format!("Failed to bind to address: {}", e), 500))?;

    tracing::info!(
        "Server running on http://{}:{}",
        config.server.host,
        config.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::new(format!("Server error: {}", e), 500))?;

    tracing::info!("Waiting for background tasks to finish");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
