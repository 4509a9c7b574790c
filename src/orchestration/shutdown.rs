//! Ctrl+C handling shared by the HTTP server and the scheduler.

use tokio::sync::watch;

/// First Ctrl+C asks the server and scheduler to stop once in-flight work ends.
/// A second Ctrl+C exits immediately.
pub fn setup_shutdown_handler() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, finishing in-flight work (press again to force quit)");
                let _ = shutdown_tx.send(true);

                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Force quit requested, exiting immediately");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to listen for Ctrl+C");
                // Keep the sender alive so receivers never see a closed channel.
                std::future::pending::<()>().await;
            }
        }
    });

    shutdown_rx
}

/// Resolves once shutdown has been requested.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
