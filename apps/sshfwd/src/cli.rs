//! Command line surface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{HostKeyPolicy, TunnelConfig};
use crate::endpoint::Endpoint;
use crate::error::TunnelError;

#[derive(Parser, Debug)]
#[command(name = "sshfwd")]
#[command(version, about = "Forward a local port to a remote service through an SSH jump host", long_about = None)]
pub struct Cli {
    /// Address and port of the local endpoint
    #[arg(short, long, default_value = "localhost:33333", value_name = "HOST:PORT")]
    pub local: Endpoint,

    /// Address and port of the SSH proxy
    #[arg(short, long, value_name = "HOST:PORT")]
    pub proxy: Endpoint,

    /// Address and port of the remote endpoint, as seen from the proxy
    #[arg(short, long, value_name = "HOST:PORT")]
    pub remote: Endpoint,

    /// SSH username
    #[arg(short, long)]
    pub user: String,

    /// Path to the SSH private key
    #[arg(short, long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Passphrase for the private key
    #[arg(long, env = "SSHFWD_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Password for the SSH user
    #[arg(long = "password", visible_alias = "pw", env = "SSHFWD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Expected SHA-256 fingerprint of the proxy host key (`SHA256:...`).
    /// Without it any host key is accepted.
    #[arg(long, value_name = "FINGERPRINT")]
    pub host_key: Option<String>,

    /// Dial timeout in seconds
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub timeout: u64,

    /// Maximum number of connections forwarded at once
    #[arg(long, value_name = "N")]
    pub max_connections: Option<usize>,
}

impl Cli {
    /// A key file, when given, is used instead of the password.
    pub fn tunnel_config(&self) -> Result<TunnelConfig, TunnelError> {
        let host_keys = match &self.host_key {
            Some(fingerprint) => HostKeyPolicy::Fingerprint(fingerprint.clone()),
            None => HostKeyPolicy::InsecureAcceptAny,
        };
        let password = match self.key {
            Some(_) => None,
            None => self.password.clone(),
        };
        Ok(TunnelConfig::from_parts(
            self.user.clone(),
            password,
            self.key.clone(),
            self.passphrase.clone(),
        )?
        .with_timeout(Duration::from_secs(self.timeout))
        .with_host_keys(host_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMethod;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sshfwd").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-p", "jump:22", "-r", "db:5432", "-u", "alice", "--pw", "s3cret"]).unwrap();
        assert_eq!(cli.local, Endpoint::new("localhost", 33333));
        assert_eq!(cli.proxy, Endpoint::new("jump", 22));
        assert_eq!(cli.remote, Endpoint::new("db", 5432));
        assert_eq!(cli.timeout, 10);
        assert!(cli.max_connections.is_none());

        let config = cli.tunnel_config().unwrap();
        assert_eq!(config.auth, AuthMethod::Password("s3cret".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.host_keys, HostKeyPolicy::InsecureAcceptAny);
    }

    #[test]
    fn test_key_file_and_host_key() {
        let cli = parse(&[
            "-l", "127.0.0.1:9000", "-p", "jump:2222", "-r", "db:5432", "-u", "bob",
            "-k", "/home/bob/.ssh/id_ed25519", "--host-key", "SHA256:abc", "--timeout", "3",
        ])
        .unwrap();

        let config = cli.tunnel_config().unwrap();
        assert_eq!(
            config.auth,
            AuthMethod::KeyFile {
                path: PathBuf::from("/home/bob/.ssh/id_ed25519"),
                passphrase: None,
            }
        );
        assert_eq!(config.host_keys, HostKeyPolicy::Fingerprint("SHA256:abc".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_key_file_wins_over_password() {
        let cli = parse(&[
            "-p", "jump:22", "-r", "db:5432", "-u", "carol", "--pw", "s3cret",
            "-k", "/home/carol/.ssh/id_ed25519", "--passphrase", "words",
        ])
        .unwrap();

        let config = cli.tunnel_config().unwrap();
        assert_eq!(
            config.auth,
            AuthMethod::KeyFile {
                path: PathBuf::from("/home/carol/.ssh/id_ed25519"),
                passphrase: Some("words".to_string()),
            }
        );
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        assert!(parse(&["-p", "jump", "-r", "db:5432", "-u", "a", "--pw", "x"]).is_err());
        assert!(parse(&["-p", "jump:22", "-r", "db:5432:1", "-u", "a", "--pw", "x"]).is_err());
        assert!(parse(&["-l", "nope", "-p", "jump:22", "-r", "db:1", "-u", "a", "--pw", "x"]).is_err());
    }

    #[test]
    fn test_required_flags() {
        assert!(parse(&["-r", "db:5432", "-u", "a"]).is_err());
        assert!(parse(&["-p", "jump:22", "-u", "a"]).is_err());
        assert!(parse(&["-p", "jump:22", "-r", "db:5432"]).is_err());
    }

    #[test]
    fn test_missing_auth_rejected() {
        let cli = parse(&["-p", "jump:22", "-r", "db:5432", "-u", "alice"]).unwrap();
        // Only meaningful when the environment doesn't supply a password
        if cli.password.is_none() {
            assert!(matches!(cli.tunnel_config(), Err(TunnelError::MissingAuth)));
        }
    }
}
