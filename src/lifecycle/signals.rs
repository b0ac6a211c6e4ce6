//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and, on unix, SIGTERM both trigger graceful shutdown.

use crate::lifecycle::shutdown::Shutdown;

/// Wait for the first termination signal.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Forward the first termination signal to `shutdown`.
///
/// Returns early without triggering when shutdown starts elsewhere.
pub async fn forward_signals(shutdown: Shutdown) {
    let mut stopped = shutdown.subscribe();
    tokio::select! {
        res = wait_for_signal() => {
            match res {
                Ok(()) => {
                    tracing::info!("Termination signal received");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to install signal handler"),
            }
        }
        _ = stopped.recv() => {}
    }
}
