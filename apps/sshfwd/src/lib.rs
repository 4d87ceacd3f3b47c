//! Single-hop SSH TCP tunnel.
//!
//! Binds a local listener and relays every accepted connection to a remote
//! target through `direct-tcpip` channels opened on an authenticated SSH
//! proxy (jump host).

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod key;
pub mod logging;
pub mod ssh;
pub mod transport;
pub mod tunnel;

pub use config::{AuthMethod, ClientAuthConfig, HostKeyPolicy, TunnelConfig};
pub use endpoint::Endpoint;
pub use error::TunnelError;
pub use logging::TunnelLogger;
pub use ssh::{SshClient, SshConnector};
pub use transport::{ProxyClient, ProxyConnector};
pub use tunnel::{Signal, Tunnel, TunnelState};
