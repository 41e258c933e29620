use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use archivum::config::Config;
use archivum::infrastructure::AppContainer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Configuration error");
            std::process::exit(1);
        }
    };

    let container = match AppContainer::new(config).await {
        Ok(container) => container,
        Err(err) => {
            error!(error = %err, "Failed to assemble application");
            std::process::exit(1);
        }
    };

    let worker_handles = container.worker_pool.start();
    let scheduler_handle = container.scheduler.start();

    let server = container.build_server();
    if let Err(err) = server.run(shutdown_signal()).await {
        error!(error = %err, "HTTP server error");
    }

    // Drain: stop reserving new jobs, give in-flight work the grace
    // period, then stop the scheduler.
    info!("Shutting down");
    container.worker_pool.shutdown(worker_handles).await;
    container.scheduler.stop();
    let _ = scheduler_handle.await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
