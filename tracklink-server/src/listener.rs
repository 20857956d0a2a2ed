//! Per-protocol accept loop: `select!` between `accept()` and a shutdown
//! watch, spawn one task per connection, track connection counts on every
//! accept/close.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use tracklink_core::codec::FrameCodec;

use crate::bus::Publisher;
use crate::error::ServerError;
use crate::metrics::ConnectionCount;
use crate::session::Session;

/// Bind `port` and accept connections for `C` until `shutdown` fires.
/// Each accepted connection gets its own [`Session<C>`] on its own task;
/// one connection's panic or decode error never reaches another's, and
/// the same isolation holds a level up between protocols, via
/// [`crate::supervisor::Supervisor`].
pub async fn run<C: FrameCodec + Default + Send + 'static>(
    port: u16,
    publisher: Arc<Publisher>,
    connections: Arc<ConnectionCount>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let addr = ("0.0.0.0", port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { protocol: C::NAME, port, source })?;
    info!(protocol = C::NAME, port, "listening");

    loop {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            res = shutdown.changed() => {
                if res.is_ok() {
                    info!(protocol = C::NAME, "shutdown signal received, stopping accept loop");
                    break;
                } else {
                    continue;
                }
            }
        };

        let (stream, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(protocol = C::NAME, error = %e, "failed to accept connection");
                connections.increment_errors();
                continue;
            }
        };

        connections.increment();
        let snapshot = connections.snapshot();
        info!(protocol = C::NAME, %addr, current = snapshot.current, total = snapshot.total, "accepted connection");

        let publisher = publisher.clone();
        let connections = connections.clone();
        tokio::spawn(async move {
            let session = Session::<C>::new(addr);
            session.run(stream, publisher, connections).await;
        });
    }

    Ok(())
}
