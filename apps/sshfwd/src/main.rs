//! sshfwd
//!
//! Forwards a local TCP port to a service that is only reachable from an SSH
//! jump host, without a VPN.
//!
//! ## Usage
//! ```bash
//! sshfwd -l localhost:5432 -p jump.example.com:22 -r 10.0.0.5:5432 -u alice -k ~/.ssh/id_ed25519
//! ```
//!
//! Press Enter (or Ctrl-C) to shut the tunnel down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use sshfwd::cli::Cli;
use sshfwd::{SshConnector, Tunnel, TunnelLogger};

/// Delay between the shutdown request and stopping the tunnel.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets may come from a .env file
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let logger = TunnelLogger::global();
    let config = cli.tunnel_config()?;
    let client_config = config
        .client_config(&logger)
        .context("cannot build SSH client configuration")?;

    let mut tunnel = Tunnel::new(
        cli.local.clone(),
        cli.proxy.clone(),
        cli.remote.clone(),
        SshConnector::new(client_config),
        logger,
    );
    if let Some(max) = cli.max_connections {
        tunnel = tunnel.with_max_connections(max);
    }
    let tunnel = Arc::new(tunnel);

    let mut runner = tokio::spawn({
        let tunnel = tunnel.clone();
        async move { tunnel.start().await }
    });

    // Start may fail before the tunnel ever becomes ready
    tokio::select! {
        _ = tunnel.wait_ready() => {}
        result = &mut runner => {
            result.context("tunnel task panicked")??;
            return Ok(());
        }
    }

    info!("Tunnel established");
    info!("{} --- {} --- {}", cli.local, cli.proxy, cli.remote);
    info!("Press Enter to shut down");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tokio::select! {
        line = lines.next_line() => {
            if let Err(e) = line {
                warn!("Cannot read stdin: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("Shutting down");
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    tunnel.stop();

    runner.await.context("tunnel task panicked")??;
    Ok(())
}
