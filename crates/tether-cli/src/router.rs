//! Command routing logic

use crate::args::{Cli, Commands};
use crate::commands;
use crate::settings::Settings;

/// Route CLI commands to their handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::resolve(
        cli.config.as_deref(),
        cli.base_url.clone(),
        cli.api_key.clone(),
    )?;

    match cli.command {
        Commands::Send {
            session_id,
            message,
            permissions,
            reconnect,
            json,
        } => {
            commands::send::execute(
                &settings,
                commands::send::SendArgs {
                    session_id,
                    message,
                    permissions,
                    reconnect,
                    json,
                    verbose: cli.verbose,
                },
            )
            .await
        }
        Commands::Watch {
            session_id,
            reconnect,
        } => commands::watch::execute(&settings, &session_id, reconnect, cli.verbose).await,
        Commands::Config => commands::config::execute(&settings),
    }
}
