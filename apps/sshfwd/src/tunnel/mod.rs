//! Tunnel lifecycle: authenticate, listen, accept and dispatch.

mod forward;
mod signal;


use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::logging::TunnelLogger;
use crate::transport::ProxyConnector;

use forward::{ConnectionForwarder, ConnectionSlot};
pub use signal::Signal;

/// Where a tunnel is in its lifecycle. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TunnelState {
    Idle,
    Authenticating,
    Listening,
    Ready,
    Dispatching,
    ShuttingDown,
    Closed,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Listening => "listening",
            Self::Ready => "ready",
            Self::Dispatching => "dispatching",
            Self::ShuttingDown => "shutting down",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

type Accepted = (TcpStream, SocketAddr);

/// A local listener relayed to `remote` through an authenticated `proxy`.
///
/// [`start`](Tunnel::start) drives the whole lifecycle and only returns once
/// the tunnel is closed, so it is meant to run on its own task with the
/// tunnel behind an `Arc`:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use sshfwd::{AuthMethod, Endpoint, SshConnector, Tunnel, TunnelConfig, TunnelLogger};
/// # async fn run() -> Result<(), sshfwd::TunnelError> {
/// let logger = TunnelLogger::global();
/// let config = TunnelConfig::new("alice", AuthMethod::Password("secret".into()));
/// let tunnel = Arc::new(Tunnel::new(
///     Endpoint::new("localhost", 33333),
///     Endpoint::new("jump.example.com", 22),
///     Endpoint::new("10.0.0.5", 5432),
///     SshConnector::new(config.client_config(&logger)?),
///     logger,
/// ));
///
/// let runner = tokio::spawn({
///     let tunnel = tunnel.clone();
///     async move { tunnel.start().await }
/// });
/// tunnel.wait_ready().await;
/// // ...
/// tunnel.stop();
/// # let _ = runner.await;
/// # Ok(())
/// # }
/// ```
pub struct Tunnel<C: ProxyConnector> {
    local: Endpoint,
    proxy: Endpoint,
    remote: Endpoint,
    connector: C,
    logger: TunnelLogger,
    state: watch::Sender<TunnelState>,
    ready: Signal,
    shutdown: Signal,
    limit: Option<Arc<Semaphore>>,
    active: Arc<AtomicUsize>,
    bound: OnceLock<SocketAddr>,
}

impl<C: ProxyConnector> Tunnel<C> {
    pub fn new(
        local: Endpoint,
        proxy: Endpoint,
        remote: Endpoint,
        connector: C,
        logger: TunnelLogger,
    ) -> Self {
        let (state, _) = watch::channel(TunnelState::Idle);
        Self {
            local,
            proxy,
            remote,
            connector,
            logger,
            state,
            ready: Signal::new(),
            shutdown: Signal::new(),
            limit: None,
            active: Arc::new(AtomicUsize::new(0)),
            bound: OnceLock::new(),
        }
    }

    /// Cap the number of concurrently forwarded connections. Connections
    /// accepted beyond the cap are closed straight away.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max)));
        self
    }

    pub fn local(&self) -> &Endpoint {
        &self.local
    }

    pub fn proxy(&self) -> &Endpoint {
        &self.proxy
    }

    pub fn remote(&self) -> &Endpoint {
        &self.remote
    }

    /// Address the listener actually bound to, once it has.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    pub fn state(&self) -> TunnelState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TunnelState> {
        self.state.subscribe()
    }

    /// Number of connections currently being relayed.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Run the tunnel until [`stop`](Tunnel::stop) is called.
    ///
    /// Fails if the proxy cannot be reached or authenticated, if the local
    /// endpoint cannot be bound, or if the tunnel was already started. The
    /// listener and the proxy client are released before this returns, on
    /// every path.
    pub async fn start(&self) -> Result<(), TunnelError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == TunnelState::Idle {
                *state = TunnelState::Authenticating;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(TunnelError::AlreadyStarted);
        }

        let result = self.run().await;
        if let Err(e) = &result {
            self.logger.error(format_args!("Tunnel failed: {}", e));
        }
        self.logger.info(format_args!("Tunnel closed."));
        self.set_state(TunnelState::Closed);
        result
    }

    /// Stop dispatching new connections and let `start` return.
    ///
    /// Safe to call from any task, any number of times; only the first call
    /// has an effect, and it is the only one that returns `true`. Connections
    /// already being relayed are left to finish on their own.
    pub fn stop(&self) -> bool {
        let fired = self.shutdown.fire();
        if fired {
            self.logger.debug(format_args!("Shutdown requested"));
        }
        fired
    }

    /// Wait until the tunnel is accepting connections.
    ///
    /// Never completes if `start` is never called or fails before the
    /// listener is up.
    pub async fn wait_ready(&self) {
        self.ready.wait().await
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_fired()
    }

    async fn run(&self) -> Result<(), TunnelError> {
        self.logger
            .info(format_args!("Connecting to proxy {}...", self.proxy));
        let client = Arc::new(self.connector.connect(&self.proxy).await?);

        self.set_state(TunnelState::Listening);
        let listener = TcpListener::bind((self.local.host.as_str(), self.local.port))
            .await
            .map_err(|source| TunnelError::Bind {
                endpoint: self.local.to_string(),
                source,
            })?;
        if let Ok(addr) = listener.local_addr() {
            let _ = self.bound.set(addr);
        }

        // Unbuffered hand-off: at most one accepted connection waits here
        let (tx, rx) = mpsc::channel(1);
        let accept = AcceptTask(Some(tokio::spawn(accept_loop(
            listener,
            tx,
            self.logger.clone(),
        ))));

        self.set_state(TunnelState::Ready);
        self.ready.fire();
        self.logger.info(format_args!(
            "Tunnel ready: {} --- {} --- {}",
            self.local, self.proxy, self.remote
        ));

        self.set_state(TunnelState::Dispatching);
        self.dispatch(rx, &client).await;

        self.set_state(TunnelState::ShuttingDown);
        accept.close().await;
        drop(client);
        Ok(())
    }

    async fn dispatch(&self, mut incoming: mpsc::Receiver<Accepted>, client: &Arc<C::Client>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => return,
                accepted = incoming.recv() => match accepted {
                    Some((stream, peer)) => self.spawn_forwarder(stream, peer, client),
                    None => {
                        // Accept loop is gone; nothing left to do but wait
                        self.shutdown.wait().await;
                        return;
                    }
                },
            }
        }
    }

    fn spawn_forwarder(&self, stream: TcpStream, peer: SocketAddr, client: &Arc<C::Client>) {
        let permit = match &self.limit {
            Some(limit) => match limit.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.logger.warn(format_args!(
                        "Connection limit reached, closing connection from {}",
                        peer
                    ));
                    return;
                }
            },
            None => None,
        };

        let forwarder = ConnectionForwarder::new(
            self.remote.clone(),
            client.clone(),
            self.logger.clone(),
            ConnectionSlot::new(self.active.clone(), permit),
        );
        tokio::spawn(forwarder.run(stream, peer));
    }

    fn set_state(&self, next: TunnelState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            self.logger
                .debug(format_args!("Tunnel state: {} -> {}", previous, next));
        }
    }
}

impl<C: ProxyConnector> fmt::Debug for Tunnel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("local", &self.local)
            .field("proxy", &self.proxy)
            .field("remote", &self.remote)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Accept loop handle. Dropping it aborts the loop, which drops the listener.
struct AcceptTask(Option<JoinHandle<()>>);

impl AcceptTask {
    /// Abort the loop and wait until the listener is gone.
    async fn close(mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for AcceptTask {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Accepted>, logger: TunnelLogger) {
    loop {
        let accepted = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                logger.error(format_args!("(listener connection error): {}", e));
                return;
            }
        };
        logger.debug(format_args!("Accepted connection from {}", accepted.1));
        if tx.send(accepted).await.is_err() {
            return;
        }
    }
}
