//! russh client handler for the proxy connection.

use async_trait::async_trait;
use russh::client::Handler;
use russh::keys::PublicKey;
use russh_keys::HashAlg;

use crate::config::HostKeyPolicy;
use crate::endpoint::Endpoint;
use crate::error::TunnelError;
use crate::logging::TunnelLogger;

/// Handler for the single SSH connection to the proxy.
///
/// Its only job is deciding whether to trust the proxy's host key.
pub struct ProxyHandler {
    proxy: Endpoint,
    host_keys: HostKeyPolicy,
    logger: TunnelLogger,
}

impl ProxyHandler {
    pub fn new(proxy: Endpoint, host_keys: HostKeyPolicy, logger: TunnelLogger) -> Self {
        Self {
            proxy,
            host_keys,
            logger,
        }
    }
}

#[async_trait]
impl Handler for ProxyHandler {
    type Error = TunnelError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();

        match self.host_keys.check(&fingerprint) {
            Ok(()) => {
                if self.host_keys == HostKeyPolicy::InsecureAcceptAny {
                    self.logger.warn(format_args!(
                        "Accepting host key {} for {} without verification",
                        fingerprint, self.proxy
                    ));
                } else {
                    self.logger.info(format_args!(
                        "Host key verified for {}: {}",
                        self.proxy, fingerprint
                    ));
                }
                Ok(true)
            }
            Err(expected) => Err(TunnelError::HostKeyRejected {
                endpoint: self.proxy.to_string(),
                expected: expected.to_string(),
                actual: fingerprint,
            }),
        }
    }
}
