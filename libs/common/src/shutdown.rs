//! Shutdown signal handling
//!
//! One awaitable that resolves when the process is asked to stop, so every
//! service tears down through the same path.

use tracing::warn;

/// Wait until the process receives Ctrl+C, or SIGTERM on Unix.
///
/// Callers run their teardown sequence after this resolves instead of
/// installing signal handlers of their own.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "SIGTERM handler unavailable ({}); only Ctrl+C will stop the service",
                    e
                );
                None
            }
        };

        let terminate = async {
            match term.as_mut() {
                Some(sig) => {
                    sig.recv().await;
                }
                // No handler installed; never resolves
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = terminate => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
