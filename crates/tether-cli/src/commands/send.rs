//! `tether send`: one message, streamed to completion

use anyhow::bail;
use std::sync::Arc;
use tether_core::{ConnectionState, PermissionDecision, PermissionRequest};

use super::{Session, Step, UiEvent};
use crate::args::PermissionPolicy;
use crate::console::CliConsole;
use crate::settings::Settings;

pub struct SendArgs {
    pub session_id: String,
    pub message: String,
    pub permissions: PermissionPolicy,
    pub reconnect: bool,
    pub json: bool,
    pub verbose: bool,
}

pub async fn execute(settings: &Settings, args: SendArgs) -> anyhow::Result<()> {
    let console = Arc::new(CliConsole::new(args.verbose));
    let mut session = Session::connect(settings, &args.session_id, console.clone())?;

    let result = drive(&mut session, &args, &console).await;
    session.coordinator.stop().await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&session.coordinator.timeline())?
        );
    } else {
        console.print_stats(&session.coordinator.stats());
    }
    result
}

async fn drive(session: &mut Session, args: &SendArgs, console: &CliConsole) -> anyhow::Result<()> {
    let mut sent = false;
    let mut interrupted = false;

    loop {
        let event = match session.next(!interrupted).await {
            Step::Event(event) => event,
            Step::Closed => bail!("session closed unexpectedly"),
            Step::Interrupted => {
                interrupted = true;
                if !session.coordinator.is_processing() {
                    console.warn("interrupted");
                    return Ok(());
                }
                console.warn("interrupted, cancelling");
                session.coordinator.cancel().await?;
                continue;
            }
        };

        match event {
            UiEvent::Permission(request) => {
                answer(session, &request, args.permissions, console).await
            }
            UiEvent::State(change) => match change.to {
                ConnectionState::Connected if !sent => {
                    sent = true;
                    console.info(&format!("sending message to {}", args.session_id));
                    session.coordinator.send_message(&args.message).await?;
                }
                ConnectionState::Completed => {
                    console.success("completed");
                    return Ok(());
                }
                ConnectionState::Cancelled => {
                    console.warn("cancelled");
                    return Ok(());
                }
                ConnectionState::Error => session.recover(&change, args.reconnect).await?,
                _ => {}
            },
        }
    }
}

async fn answer(
    session: &Session,
    request: &PermissionRequest,
    policy: PermissionPolicy,
    console: &CliConsole,
) {
    let decision = match policy {
        PermissionPolicy::Grant => PermissionDecision::Granted,
        PermissionPolicy::Deny => PermissionDecision::Denied,
    };
    console.permission(request, Some(decision));

    let result = match decision {
        PermissionDecision::Granted => session.coordinator.grant_permission(&request.id).await,
        PermissionDecision::Denied => session.coordinator.deny_permission(&request.id).await,
    };
    if let Err(e) = result {
        // The request stays pending; the service decides what happens next
        console.warn(&format!(
            "failed to {} permission {}: {}",
            decision.as_str(),
            request.id,
            e
        ));
    }
}
