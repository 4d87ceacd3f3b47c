//! SSH proxy transport built on russh.

mod client;
mod handler;


pub use client::{SshClient, SshConnector};
pub use handler::ProxyHandler;
