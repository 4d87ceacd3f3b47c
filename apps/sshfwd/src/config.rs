//! Tunnel authentication settings.
//!
//! A [`TunnelConfig`] names the SSH user, a single authentication method and
//! the trust policy for the proxy's host key. Resolving it with
//! [`TunnelConfig::client_config`] reads any key material and produces the
//! [`ClientAuthConfig`] that the SSH connector consumes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh_keys::PrivateKey;

use crate::error::TunnelError;
use crate::key::load_client_key;
use crate::logging::TunnelLogger;

/// Dial timeout used by the command line tool.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How to authenticate to the proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMethod {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

/// Which proxy host keys to trust.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key. The proxy's identity is never checked.
    #[default]
    InsecureAcceptAny,
    /// Only accept a key whose SHA-256 fingerprint matches, in OpenSSH
    /// format (`SHA256:...`).
    Fingerprint(String),
}

impl HostKeyPolicy {
    /// Check a presented fingerprint. Returns the expected value on mismatch.
    pub fn check(&self, actual: &str) -> Result<(), &str> {
        match self {
            Self::InsecureAcceptAny => Ok(()),
            Self::Fingerprint(expected) if expected.trim() == actual => Ok(()),
            Self::Fingerprint(expected) => Err(expected.as_str()),
        }
    }
}

/// SSH authentication and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelConfig {
    pub user: String,
    pub auth: AuthMethod,
    pub timeout: Duration,
    pub host_keys: HostKeyPolicy,
}

impl TunnelConfig {
    pub fn new(user: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            user: user.into(),
            auth,
            timeout: DEFAULT_TIMEOUT,
            host_keys: HostKeyPolicy::default(),
        }
    }

    /// Build from optional authentication parts.
    ///
    /// A password takes precedence over a key file here; the command line
    /// tool drops the password itself when a key file is given. Having
    /// neither is a configuration error.
    pub fn from_parts(
        user: impl Into<String>,
        password: Option<String>,
        key_file: Option<PathBuf>,
        passphrase: Option<String>,
    ) -> Result<Self, TunnelError> {
        let auth = match (password, key_file) {
            (Some(password), _) => AuthMethod::Password(password),
            (None, Some(path)) => AuthMethod::KeyFile { path, passphrase },
            (None, None) => return Err(TunnelError::MissingAuth),
        };
        Ok(Self::new(user, auth))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_host_keys(mut self, host_keys: HostKeyPolicy) -> Self {
        self.host_keys = host_keys;
        self
    }

    /// Resolve into the handle consumed by the SSH connector. Key loading and
    /// the connector itself report through `logger`.
    pub fn client_config(&self, logger: &TunnelLogger) -> Result<ClientAuthConfig, TunnelError> {
        let credential = match &self.auth {
            AuthMethod::Password(password) => Credential::Password(password.clone()),
            AuthMethod::KeyFile { path, passphrase } => {
                let key = load_client_key(path, passphrase.as_deref(), logger)?;
                Credential::PublicKey(Arc::new(key))
            }
        };
        Ok(ClientAuthConfig {
            user: self.user.clone(),
            credential,
            timeout: self.timeout,
            host_keys: self.host_keys.clone(),
            logger: logger.clone(),
        })
    }
}

#[derive(Clone)]
pub(crate) enum Credential {
    Password(String),
    PublicKey(Arc<PrivateKey>),
}

/// Resolved client settings. Only the SSH connector looks inside.
#[derive(Clone)]
pub struct ClientAuthConfig {
    pub(crate) user: String,
    pub(crate) credential: Credential,
    pub(crate) timeout: Duration,
    pub(crate) host_keys: HostKeyPolicy,
    pub(crate) logger: TunnelLogger,
}

impl std::fmt::Debug for ClientAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self.credential {
            Credential::Password(_) => "password",
            Credential::PublicKey(_) => "publickey",
        };
        f.debug_struct("ClientAuthConfig")
            .field("user", &self.user)
            .field("method", &method)
            .field("timeout", &self.timeout)
            .field("host_keys", &self.host_keys)
            .finish()
    }
}
