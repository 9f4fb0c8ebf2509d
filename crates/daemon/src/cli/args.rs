pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "pinsvc")]
#[command(about = "IPFS pinning service daemon and client")]
pub struct Args {
    /// Daemon API url (defaults to localhost on the configured api_port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// API key sent as a bearer token on pin commands
    #[arg(long, global = true, env = "PINSVC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to the pinsvc config directory (defaults to ~/.pinsvc)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
