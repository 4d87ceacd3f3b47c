//! Per-connection relay through the proxy.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;

use crate::endpoint::Endpoint;
use crate::logging::TunnelLogger;
use crate::transport::ProxyClient;

use super::signal::Signal;

/// Counts a forwarder as active for as long as it lives.
pub(crate) struct ConnectionSlot {
    active: Arc<AtomicUsize>,
    permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionSlot {
    pub(crate) fn new(active: Arc<AtomicUsize>, permit: Option<OwnedSemaphorePermit>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active, permit }
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        // Capacity is back before the count says so
        drop(self.permit.take());
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Dials `remote` through the proxy for one accepted local connection and
/// relays bytes until either side finishes.
pub(crate) struct ConnectionForwarder<P: ProxyClient> {
    remote: Endpoint,
    client: Arc<P>,
    logger: TunnelLogger,
    slot: ConnectionSlot,
}

/// Held by both copy tasks; the proxy client and the slot outlive the pair.
struct Pairing<P> {
    _client: Arc<P>,
    _slot: ConnectionSlot,
    closed: Signal,
}

impl<P: ProxyClient> ConnectionForwarder<P> {
    pub(crate) fn new(
        remote: Endpoint,
        client: Arc<P>,
        logger: TunnelLogger,
        slot: ConnectionSlot,
    ) -> Self {
        Self {
            remote,
            client,
            logger,
            slot,
        }
    }

    /// If the remote endpoint is not available the local connection is
    /// closed; the local client sees that as the error.
    pub(crate) async fn run(self, local: TcpStream, peer: SocketAddr) {
        let remote = match self.client.open_channel(&self.remote, peer).await {
            Ok(stream) => stream,
            Err(e) => {
                self.logger.error(format_args!(
                    "(forward - cannot dial remote endpoint {}): {}",
                    self.remote, e
                ));
                drop(local);
                return;
            }
        };
        self.logger
            .debug(format_args!("Forwarding {} -> {}", peer, self.remote));

        let (local_read, local_write) = tokio::io::split(local);
        let (remote_read, remote_write) = tokio::io::split(remote);

        let pairing = Arc::new(Pairing {
            _client: self.client,
            _slot: self.slot,
            closed: Signal::new(),
        });

        tokio::spawn(copy_until_closed(
            local_read,
            remote_write,
            "local->remote",
            pairing.clone(),
            self.logger.clone(),
        ));
        tokio::spawn(copy_until_closed(
            remote_read,
            local_write,
            "remote->local",
            pairing,
            self.logger,
        ));
    }
}

/// Copy `src` into `dst` until EOF or an error, or until the opposite
/// direction has finished. Either way the pairing is closed on exit.
async fn copy_until_closed<R, W, P>(
    mut src: R,
    mut dst: W,
    direction: &'static str,
    pairing: Arc<Pairing<P>>,
    logger: TunnelLogger,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Once the pair is closed no further bytes are relayed
    let copied = tokio::select! {
        biased;
        _ = pairing.closed.wait() => None,
        copied = tokio::io::copy(&mut src, &mut dst) => Some(copied),
    };
    pairing.closed.fire();
    let _ = dst.shutdown().await;

    match copied {
        Some(Ok(bytes)) => {
            logger.debug(format_args!("({}) finished after {} bytes", direction, bytes))
        }
        Some(Err(e)) => logger.error(format_args!("(copy {}): {}", direction, e)),
        None => {}
    }
}
