//! `tether watch`: observe a session's event stream

use std::sync::Arc;
use tether_core::ConnectionState;

use super::{Session, Step, UiEvent};
use crate::console::CliConsole;
use crate::settings::Settings;

pub async fn execute(
    settings: &Settings,
    session_id: &str,
    reconnect: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let console = Arc::new(CliConsole::new(verbose));
    let mut session = Session::connect(settings, session_id, console.clone())?;

    let result = loop {
        let event = match session.next(true).await {
            Step::Event(event) => event,
            Step::Interrupted | Step::Closed => break Ok(()),
        };
        match event {
            UiEvent::Permission(request) => console.permission(&request, None),
            UiEvent::State(change) => match change.to {
                ConnectionState::Connected => console.success(&format!("watching {}", session_id)),
                ConnectionState::Completed => console.success("cycle completed"),
                ConnectionState::Cancelled => console.warn("cycle cancelled"),
                ConnectionState::Error => {
                    if let Err(e) = session.recover(&change, reconnect).await {
                        break Err(e);
                    }
                }
                _ => {}
            },
        }
    };

    session.coordinator.stop().await;
    if verbose {
        console.print_stats(&session.coordinator.stats());
    }
    result
}
