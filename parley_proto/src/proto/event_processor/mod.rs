//! Processors for everything the executor drains from the session inbox. Each processor runs to
//! completion before the next event is taken, so at most one of them touches a conversation at a
//! time from the event loop.

use crate::error::SessionError;
use crate::proto::events::{InboundEvent, SessionNotification};
use crate::proto::session::Session;

/// Caller-side establishment flows started by [`Session::call`]
pub(crate) mod caller;
/// Inbound signaling messages
pub(crate) mod signaling_event;
/// Callbacks of the real-time transport
pub(crate) mod transport_event;

/// Runs the processor matching `event`. Failures are logged and reported to the kernel, never
/// propagated, so one bad event cannot stop the loop
pub(crate) async fn process_inbound(session: &Session, event: InboundEvent) {
    let (conversation_id, result) = match event {
        InboundEvent::Signaling { bound_to, message } => (
            Some(message.conversation_id),
            signaling_event::process_signaling(session, bound_to, message).await,
        ),

        InboundEvent::Transport {
            conversation_id,
            event,
        } => (
            Some(conversation_id),
            transport_event::process_transport(session, conversation_id, event).await,
        ),

        InboundEvent::Shutdown => (None, Ok(())),
    };

    if let Err(err) = result {
        report(session, conversation_id, err);
    }
}

fn report(session: &Session, conversation_id: Option<uuid::Uuid>, err: SessionError) {
    match &err {
        SessionError::ProtocolViolation { .. } => {
            log::warn!(target: "parley", "Dropped misrouted message: {err}")
        }
        _ => log::error!(target: "parley", "Failed to process event for {conversation_id:?}: {err}"),
    }

    session.notify(SessionNotification::Error(conversation_id, err));
}
