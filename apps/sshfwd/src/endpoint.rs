//! Host/port descriptors.

use std::fmt;
use std::str::FromStr;

/// A network destination. Displays as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when an address string is not exactly `host:port`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid address '{0}': expected host:port")]
pub struct ParseEndpointError(String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    /// Splits on a single colon. Bracketed IPv6 literals are not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (host, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) => (host, port),
            _ => return Err(ParseEndpointError(s.to_string())),
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| ParseEndpointError(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
