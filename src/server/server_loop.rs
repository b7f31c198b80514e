// Server loop module
// Accepts connections until a shutdown signal, then drains in-flight ones

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the accept loop until `shutdown` resolves.
///
/// After the signal the listener is closed, open connections are told to
/// finish, and the loop waits up to `performance.shutdown_grace` seconds for
/// them before returning.
pub async fn start_server_loop<S>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future<Output = std::io::Result<&'static str>>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::pin!(shutdown);

    let signal = loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(
                        stream,
                        peer_addr,
                        &state,
                        &active_connections,
                        &shutdown_rx,
                    ),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            signal = &mut shutdown => break signal?,
        }
    };

    drop(listener);
    logger::log_shutdown_started(signal, active_connections.load(Ordering::SeqCst));
    shutdown_tx.send_replace(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let remaining = drain(&active_connections, grace).await;
    logger::log_shutdown_complete(remaining);
    Ok(())
}

/// Wait for the active connection count to reach zero; returns what is left
async fn drain(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    loop {
        let count = active.load(Ordering::SeqCst);
        if count == 0 || Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
