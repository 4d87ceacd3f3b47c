//! Proxy connector and client over SSH.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::ChannelStream;
use tokio::time::timeout;

use crate::config::{ClientAuthConfig, Credential};
use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::logging::TunnelLogger;
use crate::transport::{ProxyClient, ProxyConnector};

use super::ProxyHandler;

/// Interval between SSH keepalives on an otherwise idle proxy connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Dials and authenticates to an SSH proxy with a resolved [`ClientAuthConfig`].
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: ClientAuthConfig,
}

impl SshConnector {
    pub fn new(config: ClientAuthConfig) -> Self {
        Self { config }
    }

    async fn handshake(&self, proxy: &Endpoint) -> Result<Handle<ProxyHandler>, TunnelError> {
        let ssh_config = Arc::new(client::Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..Default::default()
        });
        let handler = ProxyHandler::new(
            proxy.clone(),
            self.config.host_keys.clone(),
            self.config.logger.clone(),
        );

        let dial = client::connect(ssh_config, (proxy.host.as_str(), proxy.port), handler);
        let wrap = |source: TunnelError| TunnelError::ProxyConnect {
            endpoint: proxy.to_string(),
            source: Box::new(source),
        };

        match timeout(self.config.timeout, dial).await {
            Err(_) => Err(wrap(TunnelError::Timeout(self.config.timeout))),
            Ok(Err(e @ TunnelError::HostKeyRejected { .. })) => Err(e),
            Ok(Err(e)) => Err(wrap(e)),
            Ok(Ok(handle)) => Ok(handle),
        }
    }

    async fn authenticate(&self, handle: &mut Handle<ProxyHandler>) -> Result<(), TunnelError> {
        let user = self.config.user.as_str();
        let logger = &self.config.logger;
        let authenticated = match &self.config.credential {
            Credential::Password(password) => {
                logger.debug(format_args!("Authenticating as '{}' with password", user));
                handle.authenticate_password(user, password.as_str()).await?
            }
            Credential::PublicKey(key) => {
                logger.debug(format_args!("Authenticating as '{}' with public key", user));
                handle.authenticate_publickey(user, key.clone()).await?
            }
        };

        if authenticated {
            Ok(())
        } else {
            Err(TunnelError::AuthFailed(self.config.user.clone()))
        }
    }
}

#[async_trait]
impl ProxyConnector for SshConnector {
    type Client = SshClient;

    async fn connect(&self, proxy: &Endpoint) -> Result<SshClient, TunnelError> {
        let mut handle = self.handshake(proxy).await?;

        match timeout(self.config.timeout, self.authenticate(&mut handle)).await {
            Ok(result) => result?,
            Err(_) => return Err(TunnelError::Timeout(self.config.timeout)),
        }

        self.config.logger.info(format_args!(
            "Authenticated to proxy {} as '{}'",
            proxy, self.config.user
        ));
        Ok(SshClient {
            handle,
            logger: self.config.logger.clone(),
        })
    }
}

/// Authenticated SSH session to the proxy. Dropping the last reference ends
/// the session.
pub struct SshClient {
    handle: Handle<ProxyHandler>,
    logger: TunnelLogger,
}

#[async_trait]
impl ProxyClient for SshClient {
    type Stream = ChannelStream<Msg>;

    async fn open_channel(
        &self,
        target: &Endpoint,
        originator: SocketAddr,
    ) -> Result<Self::Stream, TunnelError> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(
                target.host.as_str(),
                u32::from(target.port),
                originator.ip().to_string(),
                u32::from(originator.port()),
            )
            .await
            .map_err(|e| TunnelError::RemoteDial {
                endpoint: target.to_string(),
                reason: e.to_string(),
            })?;

        self.logger.debug(format_args!(
            "Opened direct-tcpip channel {:?} to {} for {}",
            channel.id(),
            target,
            originator
        ));
        Ok(channel.into_stream())
    }
}
