//! Tether command-line interface
//!
//! Drives a streaming session against an HTTP agent service: open the event
//! stream, send a message, and render reasoning, content, tool activity and
//! permission requests as they arrive.

mod args;
mod commands;
mod console;
mod router;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    router::route(cli).await
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so streamed output on stdout stays clean
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
