use crate::error::SessionError;
use crate::proto::conversation::{Conversation, ConversationState, Participant, SignalingLink};
use crate::proto::data_channel::DataChannelEventHandler;
use crate::proto::events::SessionNotification;
use crate::proto::session::Session;
use parley_types::prelude::{
    CandidatePayload, Message, MessageBody, Negotiation, Resource, SessionDescription,
};
use uuid::Uuid;

/// Entry point for every message pushed by a signaling stub. `bound_to` is set when the message
/// arrived on a stub dedicated to one conversation
pub(crate) async fn process_signaling(
    session: &Session,
    bound_to: Option<Uuid>,
    message: Message,
) -> Result<(), SessionError> {
    log::trace!(target: "parley", "[signaling] {} {} -> {:?} in {}", message.body.type_name(), message.from, message.to, message.conversation_id);

    if let Some(expected) = bound_to {
        if expected != message.conversation_id {
            return Err(SessionError::ProtocolViolation {
                expected,
                received: message.conversation_id,
            });
        }
    }

    match session.conversation(message.conversation_id) {
        Some(handle) => {
            let mut conversation = handle.lock().await;
            if conversation.is_closed() {
                log::warn!(target: "parley", "Conversation {} is closed, dropping {}", message.conversation_id, message.body.type_name());
                return Ok(());
            }

            let result = process_attached(session, &mut conversation, &message).await;
            let closed = conversation.is_closed();
            drop(conversation);

            if closed {
                session.remove_conversation(message.conversation_id);
            }

            session.notify(SessionNotification::Message(message));
            result
        }

        None => process_unattached(session, message).await,
    }
}

/// Messages without a conversation. Only an invitation has something to set up
async fn process_unattached(session: &Session, message: Message) -> Result<(), SessionError> {
    let result = match &message.body {
        MessageBody::Invitation(negotiation) => {
            spawn_conversation(session, &message, negotiation).await
        }

        MessageBody::Accepted(_) | MessageBody::ConnectivityCandidate(_) => {
            log::warn!(target: "parley", "{} for unknown conversation {}", message.body.type_name(), message.conversation_id);
            Ok(())
        }

        _ => Ok(()),
    };

    session.notify(SessionNotification::Message(message));
    result
}

/// Creates the conversation an invitation asks for, reusing the caller's conversation id
async fn spawn_conversation(
    session: &Session,
    message: &Message,
    negotiation: &Negotiation,
) -> Result<(), SessionError> {
    let own = session.own_identity()?;
    let caller = session.directory.resolve(&message.from, None).await?;

    let handle = session
        .create_conversation(
            message.conversation_id,
            message.from.clone(),
            Participant::new(own.clone(), &negotiation.demand),
        )
        .await?;

    let mut conversation = handle.lock().await;
    conversation.attach_signaling(SignalingLink::Shared(own.stub().clone()));
    let _ = conversation.add_remote_participant(caller, &negotiation.demand);

    if session.config.auto_accept {
        establish(session, &mut conversation, negotiation).await
    } else {
        conversation.set_state(ConversationState::Deciding);
        Ok(())
    }
}

async fn process_attached(
    session: &Session,
    conversation: &mut Conversation,
    message: &Message,
) -> Result<(), SessionError> {
    match &message.body {
        MessageBody::Invitation(negotiation) => {
            if conversation.state() == ConversationState::Deciding {
                return Ok(());
            }

            let sender = session.directory.resolve(&message.from, None).await?;
            let established = conversation
                .remote_participant(&message.from)
                .map(|participant| participant.demand().clone())
                .unwrap_or_default();

            if !conversation.add_remote_participant(sender, &negotiation.demand) {
                if let Some(participant) = conversation.remote_participant_mut(&message.from) {
                    let _ = participant.update_demand(&negotiation.demand, true);
                }
            }

            let media = [Resource::Audio, Resource::Video]
                .into_iter()
                .any(|resource| negotiation.demand.wants(resource) && !established.wants(resource));
            let data = negotiation.demand.wants_data();
            establish_resources(session, conversation, negotiation, media, data).await
        }

        MessageBody::Accepted(negotiation) => {
            let description = remote_description(negotiation)?;
            conversation
                .connection()?
                .set_remote_description(description)
                .await?;

            let peer = conversation.first_remote()?.address().clone();
            let last = Message::last_candidate(conversation.me().clone(), peer, conversation.id());
            conversation.send(last).await?;
            conversation.open_ice_gate().await?;
            conversation.set_state(ConversationState::Established);
            Ok(())
        }

        MessageBody::ConnectivityCandidate(CandidatePayload::Last) => {
            conversation.open_ice_gate().await
        }

        MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(candidate)) => {
            conversation
                .connection()?
                .add_ice_candidate(candidate.clone())
                .await
        }

        MessageBody::Bye => {
            log::trace!(target: "parley", "{} left conversation {}", message.from, conversation.id());
            conversation.leave().await;
            Ok(())
        }

        MessageBody::Unknown { kind, .. } => {
            log::warn!(target: "parley", "Unrecognized message type {kind} in {}", conversation.id());
            Ok(())
        }

        MessageBody::Declined
        | MessageBody::Update { .. }
        | MessageBody::UpdateSdp { .. }
        | MessageBody::Updated
        | MessageBody::Presence { .. }
        | MessageBody::Message(_) => Ok(()),
    }
}

/// Answers an invitation with whatever audio, video and data it requests
pub(crate) async fn establish(
    session: &Session,
    conversation: &mut Conversation,
    negotiation: &Negotiation,
) -> Result<(), SessionError> {
    let demand = &negotiation.demand;
    if demand.is_empty() {
        return Err(SessionError::InvalidArgument("invitation requests no resource"));
    }

    let (media, data) = (demand.wants_media(), demand.wants_data());
    establish_resources(session, conversation, negotiation, media, data).await
}

/// Applies the invitation's offer once, attaches local media and/or a data channel, then sends a
/// single `accepted`. The ICE gate stays closed until that answer is out
async fn establish_resources(
    session: &Session,
    conversation: &mut Conversation,
    negotiation: &Negotiation,
    media: bool,
    data: bool,
) -> Result<(), SessionError> {
    let data = data && conversation.data_handler().is_none();
    if !media && !data {
        log::trace!(target: "parley", "Nothing left to establish in conversation {}", conversation.id());
        return Ok(());
    }

    conversation.close_ice_gate();
    if data {
        bind_data_channel(session, conversation, negotiation).await?;
    }

    let connection = conversation.connection()?;
    connection
        .set_remote_description(remote_description(negotiation)?)
        .await?;

    if media {
        let stream = session.media.acquire(&negotiation.demand.incoming).await?;
        for track in &stream.tracks {
            connection.add_track(track.clone(), &stream).await?;
        }
    }

    answer(conversation).await
}

async fn bind_data_channel(
    session: &Session,
    conversation: &mut Conversation,
    negotiation: &Negotiation,
) -> Result<(), SessionError> {
    let me = conversation.me().clone();
    let peer = conversation.first_remote()?.identity().clone();
    let (payload_type, codec) = conversation
        .codec_broker_or_init(&session.codecs)
        .bind(&me, &peer, &negotiation.demand.incoming.data)?;

    let channel = conversation
        .connection()?
        .create_data_channel(&Uuid::new_v4().to_string())
        .await?;
    let mut handler = DataChannelEventHandler::new(peer.address().clone(), payload_type, codec);
    let opened = handler.attach(channel);
    conversation.set_data_handler(handler);
    session.notify(SessionNotification::DataChannel(conversation.id(), opened));
    Ok(())
}

/// Creates and applies the local answer, reports it with `accepted` and releases held candidates
async fn answer(conversation: &mut Conversation) -> Result<(), SessionError> {
    let connection = conversation.connection()?;
    let answer = connection.create_answer().await?;
    connection.set_local_description(answer).await?;
    let local = connection
        .local_description()
        .ok_or_else(|| SessionError::transport("local description unavailable after it was set"))?;

    let peer = conversation.first_remote()?;
    let accepted = Message::accepted(
        conversation.me().clone(),
        peer.address(),
        conversation.id(),
        peer.demand().clone(),
        local,
    );
    conversation.send(accepted).await?;
    conversation.open_ice_gate().await?;
    conversation.set_state(ConversationState::Established);
    Ok(())
}

fn remote_description(negotiation: &Negotiation) -> Result<SessionDescription, SessionError> {
    negotiation
        .session_description
        .clone()
        .ok_or(SessionError::InvalidArgument("negotiation carries no session description"))
}

