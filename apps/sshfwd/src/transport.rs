//! The two operations the tunnel needs from a proxy transport.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::endpoint::Endpoint;
use crate::error::TunnelError;

/// Dials and authenticates to a proxy host.
#[async_trait]
pub trait ProxyConnector: Send + Sync + 'static {
    type Client: ProxyClient;

    async fn connect(&self, proxy: &Endpoint) -> Result<Self::Client, TunnelError>;
}

/// An authenticated, multiplexed connection to a proxy.
///
/// Shared by every forwarder at once, so `open_channel` takes `&self`.
#[async_trait]
pub trait ProxyClient: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Open a logical channel to `target`. `originator` is the local peer the
    /// channel is opened on behalf of.
    async fn open_channel(
        &self,
        target: &Endpoint,
        originator: SocketAddr,
    ) -> Result<Self::Stream, TunnelError>;
}
