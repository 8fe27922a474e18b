//! Configuration for the agent node.
//!
//! Values come from CLI flags or environment variables (`.env` is loaded at
//! startup). Library crates never read the environment themselves; whatever
//! they need is passed down from here.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// CLI / environment configuration for the ANP agent.
#[derive(Parser, Debug, Clone)]
#[command(name = "anp-agent")]
#[command(about = "Agent Network Protocol agent node")]
pub struct Config {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,
    /// Public host of this agent's `did:wba` identifier.
    #[arg(long = "did-host", env = "DID_HOST", default_value = "localhost")]
    pub did_host: String,
    /// Public port of the identifier, when not the default HTTPS port.
    #[arg(long = "did-port", env = "DID_PORT")]
    pub did_port: Option<u16>,
    /// Slash-separated path of the identifier (empty for none).
    #[arg(long = "did-path", env = "DID_PATH", default_value = "")]
    pub did_path: String,
    /// Display name served in `ad.json`.
    #[arg(long = "agent-name", env = "AGENT_NAME", default_value = "anp-agent")]
    pub agent_name: String,
    /// Path to the hex-encoded secp256k1 signing key. Generated and written
    /// on first start when absent.
    #[arg(long = "key-file", env = "KEY_FILE", default_value = "agent-key.hex")]
    pub key_file: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }

    /// The external authority callers sign their `DIDWba` headers over.
    pub fn service_authority(&self) -> String {
        match self.did_port {
            Some(port) => format!("{}:{port}", self.did_host),
            None => self.did_host.clone(),
        }
    }
}
