use crate::error::SessionError;
use crate::proto::conversation::Conversation;
use crate::proto::data_channel::DataChannelEventHandler;
use crate::proto::events::{SessionNotification, TransportEvent};
use crate::proto::session::Session;
use parley_types::prelude::{DemandValue, Message};
use uuid::Uuid;

/// Reacts to one transport callback, then hands it to the kernel. Data channel traffic reaches
/// the kernel decoded, as a [`DataChannelEvent`](crate::proto::events::DataChannelEvent)
pub(crate) async fn process_transport(
    session: &Session,
    conversation_id: Uuid,
    event: TransportEvent,
) -> Result<(), SessionError> {
    let Some(handle) = session.conversation(conversation_id) else {
        log::trace!(target: "parley", "Transport event for unknown conversation {conversation_id}: {event:?}");
        return Ok(());
    };

    let mut conversation = handle.lock().await;
    if conversation.is_closed() {
        return Ok(());
    }

    let result = match &event {
        TransportEvent::NegotiationNeeded => renegotiate(&mut conversation).await,

        TransportEvent::IceCandidate(Some(candidate)) => match conversation.first_remote() {
            Ok(peer) => {
                let message = Message::candidate(
                    conversation.me().clone(),
                    peer.address(),
                    conversation_id,
                    candidate.clone(),
                );
                conversation.relay_candidate(message).await
            }

            Err(_) => {
                log::warn!(target: "parley", "Candidate in conversation {conversation_id} without a peer, dropping");
                Ok(())
            }
        },

        // end of gathering. The peer learns readiness from the "last" marker instead
        TransportEvent::IceCandidate(None) => Ok(()),

        TransportEvent::DataChannelOpened(channel) => {
            let opened = match conversation.data_handler_mut() {
                Some(handler) => Ok(handler.attach(channel.clone())),
                None => bind_remote_channel(session, &mut conversation).map(|mut handler| {
                    let opened = handler.attach(channel.clone());
                    conversation.set_data_handler(handler);
                    opened
                }),
            };

            opened.map(|opened| {
                session.notify(SessionNotification::DataChannel(conversation_id, opened))
            })
        }

        TransportEvent::DataChannelMessage { label, payload } => {
            match conversation.data_handler() {
                Some(handler) if handler.routes(label) => {
                    let codec = conversation
                        .codec_broker()
                        .and_then(|broker| {
                            broker.lookup(
                                conversation.me(),
                                handler.peer(),
                                &DemandValue::from(handler.payload_type()),
                            )
                        })
                        .map(|(payload_type, binding)| (payload_type, binding.codec.clone()));

                    handler.on_frame(label, payload, codec).map(|message| {
                        session.notify(SessionNotification::DataChannel(conversation_id, message))
                    })
                }

                _ => {
                    log::warn!(target: "parley", "Frame on unrouted data channel {label} in {conversation_id}, dropping");
                    Ok(())
                }
            }
        }

        TransportEvent::DataChannelClosed { label } => {
            if let Some(closed) = conversation
                .data_handler_mut()
                .and_then(|handler| handler.on_close(label))
            {
                session.notify(SessionNotification::DataChannel(conversation_id, closed));
            }
            Ok(())
        }

        TransportEvent::TrackAdded { .. }
        | TransportEvent::LocalStreamAdded(_)
        | TransportEvent::SignalingStateChanged(_)
        | TransportEvent::IceConnectionStateChanged(_) => Ok(()),
    };

    drop(conversation);

    if !event.is_data_channel_traffic() {
        session.notify(SessionNotification::Transport(conversation_id, event));
    }

    result
}

/// A fresh offer for resources added mid-session, announced with `updateSdp`
async fn renegotiate(conversation: &mut Conversation) -> Result<(), SessionError> {
    let connection = conversation.connection()?;
    let offer = connection.create_offer().await?;
    connection.set_local_description(offer.clone()).await?;

    let peer = conversation.first_remote()?.address().clone();
    let update = Message::update_sdp(conversation.me().clone(), peer, conversation.id(), offer);
    conversation.send(update).await
}

/// The peer opened a channel before this side bound a handler. Uses the codec negotiated for the
/// peer's outgoing data demand, or plain if it never asked for one
fn bind_remote_channel(
    session: &Session,
    conversation: &mut Conversation,
) -> Result<DataChannelEventHandler, SessionError> {
    let me = conversation.me().clone();
    let peer = conversation.first_remote()?;
    let identity = peer.identity().clone();
    let requested = match &peer.demand().outgoing.data {
        requested if requested.is_requested() => requested.clone(),
        _ => DemandValue::Flag(true),
    };

    let broker = conversation.codec_broker_or_init(&session.codecs);
    let bound = broker
        .lookup(&me, identity.address(), &requested)
        .map(|(payload_type, binding)| (payload_type, binding.codec.clone()));
    let (payload_type, codec) = match bound {
        Some(bound) => bound,
        None => broker.bind(&me, &identity, &requested)?,
    };

    Ok(DataChannelEventHandler::new(
        identity.address().clone(),
        payload_type,
        codec,
    ))
}
