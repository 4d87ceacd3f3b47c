//! Error types for the tunnel.

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for tunnel-related operations.
///
/// Variants fall into two classes. Tunnel-fatal errors stop `Tunnel::start`
/// (or prevent the tunnel from being built at all); connection-local errors
/// end a single forwarded connection and are only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Authentication method required: key file or password")]
    MissingAuth,

    #[error("Cannot read key '{}': {source}", path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse key: {0}")]
    KeyParse(#[from] russh_keys::Error),

    #[error("Cannot dial proxy {endpoint}: {source}")]
    ProxyConnect {
        endpoint: String,
        #[source]
        source: Box<TunnelError>,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed for user '{0}'")]
    AuthFailed(String),

    #[error("Host key for {endpoint} rejected: expected {expected}, got {actual}")]
    HostKeyRejected {
        endpoint: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot start listener on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tunnel already started")]
    AlreadyStarted,

    #[error("Cannot dial remote endpoint {endpoint}: {reason}")]
    RemoteDial { endpoint: String, reason: String },

    #[error("SSH protocol error: {0}")]
    SshError(#[from] russh::Error),
}

impl TunnelError {
    /// Whether this error ends the whole tunnel rather than one connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoteDial { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_error_display() {
        let err = TunnelError::AuthFailed("bob".to_string());
        assert_eq!(format!("{}", err), "Authentication failed for user 'bob'");

        let err = TunnelError::MissingAuth;
        assert_eq!(
            format!("{}", err),
            "Authentication method required: key file or password"
        );

        let err = TunnelError::RemoteDial {
            endpoint: "db:5432".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Cannot dial remote endpoint db:5432: connection refused"
        );
    }

    #[test]
    fn test_proxy_connect_wraps_cause() {
        let err = TunnelError::ProxyConnect {
            endpoint: "jump:22".to_string(),
            source: Box::new(TunnelError::Timeout(Duration::from_secs(10))),
        };
        assert_eq!(format!("{}", err), "Cannot dial proxy jump:22: Timed out after 10s");
    }

    #[test]
    fn test_severity_split() {
        assert!(TunnelError::MissingAuth.is_fatal());
        assert!(TunnelError::AlreadyStarted.is_fatal());
        assert!(TunnelError::AuthFailed("x".to_string()).is_fatal());

        let dial = TunnelError::RemoteDial {
            endpoint: "a:1".to_string(),
            reason: "refused".to_string(),
        };
        assert!(!dial.is_fatal());

        let ssh = TunnelError::SshError(russh::Error::Disconnect);
        assert!(ssh.is_fatal());
    }

    #[test]
    fn test_tunnel_error_debug() {
        let err = TunnelError::AuthFailed("test".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("AuthFailed"));
    }
}
