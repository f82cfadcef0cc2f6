//! Per-line command dispatcher
//!
//! Interprets one inbound line for a session. Client mistakes are answered
//! to that client only; the returned error is reserved for failures that
//! end the session.

use tracing::{debug, warn};

use crate::error::{MalformedReason, RelayError, SendError};
use crate::message::{ClientCommand, ServerNotice};
use crate::session::{Session, SessionHandle};

/// Handle one inbound line
pub async fn dispatch(session: &mut Session, line: &str) -> Result<(), RelayError> {
    match ClientCommand::parse(line) {
        ClientCommand::Who => handle_who(session).await,
        ClientCommand::Rename { new_name } => handle_rename(session, new_name).await,
        ClientCommand::DirectMessage { target, body } => {
            handle_direct(session, target, body).await
        }
        ClientCommand::Broadcast { body } => session.publish(body).await,
    }
}

/// List everyone online, to the requester only
async fn handle_who(session: &Session) -> Result<(), RelayError> {
    let online = session.registry().snapshot();
    for peer in online {
        session
            .notify(ServerNotice::WhoEntry {
                addr: peer.addr,
                name: peer.name,
            })
            .await?;
    }
    Ok(())
}

async fn handle_rename(session: &mut Session, new_name: &str) -> Result<(), RelayError> {
    let result = if new_name.is_empty() {
        Err(RelayError::NameTaken(String::new()))
    } else {
        session.rename(new_name)
    };

    match result {
        Ok(()) => {
            session
                .notify(ServerNotice::Renamed {
                    name: new_name.to_string(),
                })
                .await
        }
        // Evicted while the command was in flight; end the read loop quietly
        Err(RelayError::SessionGone(_)) => Err(RelayError::ConnectionClosed),
        Err(e) => {
            debug!("Rename to '{}' refused for {}: {}", new_name, session.id(), e);
            session.notify(e.into()).await
        }
    }
}

/// Send `<sender>:<body>` straight to one session, bypassing the relay
async fn handle_direct(session: &Session, target: &str, body: &str) -> Result<(), RelayError> {
    let recipient = match check_direct(session, target, body) {
        Ok(recipient) => recipient,
        Err(e) => return session.notify(e.into()).await,
    };

    let notice = ServerNotice::Direct {
        from: session.name().to_string(),
        body: body.to_string(),
    };
    match recipient.deliver(notice) {
        Ok(()) => {}
        Err(SendError::QueueFull) => {
            warn!("Outbound queue full for '{}', dropping direct message", target);
        }
        Err(SendError::ChannelClosed) => {
            debug!("Direct message target '{}' is closing", target);
        }
    }
    Ok(())
}

fn check_direct(
    session: &Session,
    target: &str,
    body: &str,
) -> Result<SessionHandle, RelayError> {
    if target.is_empty() {
        return Err(RelayError::MalformedCommand(MalformedReason::MissingTarget));
    }
    let recipient = session
        .registry()
        .lookup(target)
        .ok_or_else(|| RelayError::TargetNotFound(target.to_string()))?;
    if body.is_empty() {
        return Err(RelayError::MalformedCommand(MalformedReason::EmptyBody));
    }
    Ok(recipient)
}
