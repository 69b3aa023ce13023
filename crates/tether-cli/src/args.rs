//! CLI argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Streaming session client for agent services")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./tether.toml, then the user config dir)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL
    #[arg(long, global = true, env = "TETHER_BASE_URL")]
    pub base_url: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, global = true, env = "TETHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the response until the cycle ends
    Send {
        /// Session to talk to
        session_id: String,

        /// Message content
        message: String,

        /// How to answer permission requests
        #[arg(long, value_enum, default_value_t = PermissionPolicy::Deny)]
        permissions: PermissionPolicy,

        /// Follow the service's retry hints after a rate limit
        #[arg(long)]
        reconnect: bool,

        /// Print the session timeline as JSON when done
        #[arg(long)]
        json: bool,
    },

    /// Watch a session's event stream without sending anything
    Watch {
        /// Session to watch
        session_id: String,

        /// Follow the service's retry hints after a rate limit
        #[arg(long)]
        reconnect: bool,
    },

    /// Print the resolved configuration
    Config,
}

/// Automatic answer to permission requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PermissionPolicy {
    Grant,
    Deny,
}
