//! OS signal handling.
//!
//! SIGINT and SIGTERM both start a graceful shutdown. If a handler cannot be
//! installed, that signal source simply never fires.

use tokio::signal;

/// Resolves when the process receives SIGINT or SIGTERM.
pub async fn terminate() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Caught signal"),
        _ = sigterm => tracing::info!(signal = "SIGTERM", "Caught signal"),
    }
}
