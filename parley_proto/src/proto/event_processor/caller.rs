use crate::error::SessionError;
use crate::proto::conversation::Conversation;
use crate::proto::data_channel::DataChannelEventHandler;
use crate::proto::events::{SessionNotification, TransportEvent};
use crate::proto::identity::Identity;
use crate::proto::session::Session;
use parley_types::prelude::{Demand, Message, Resource, SessionDescription};
use uuid::Uuid;

/// Offers audio and/or video. Data is left to [`invite_data`], which negotiates separately
pub(crate) async fn invite_media(
    session: &Session,
    conversation: &mut Conversation,
    remote: &Identity,
    demand: &Demand,
) -> Result<(), SessionError> {
    let media_demand = Demand::merge_disallow(demand, Resource::Data.as_str());
    let connection = conversation.connection()?;

    let stream = session.media.acquire(&media_demand.outgoing).await?;
    conversation
        .events()
        .send(TransportEvent::LocalStreamAdded(stream.clone()))?;
    for track in &stream.tracks {
        connection.add_track(track.clone(), &stream).await?;
    }

    let offer = offer(conversation).await?;
    let invitation = Message::invitation(
        conversation.me().clone(),
        remote.address(),
        conversation.id(),
        media_demand,
        offer,
    );

    log::trace!(target: "parley", "Inviting {} to media in {}", remote.address(), conversation.id());
    conversation.send(invitation).await
}

/// Opens a data channel using the codec `remote` advertises for the requested payload type
pub(crate) async fn invite_data(
    session: &Session,
    conversation: &mut Conversation,
    remote: &Identity,
    demand: &Demand,
) -> Result<(), SessionError> {
    if conversation.data_handler().is_some() {
        log::trace!(target: "parley", "Conversation {} already has a data channel", conversation.id());
        return Ok(());
    }

    let requested = demand.outgoing.data.clone();
    let me = conversation.me().clone();
    let (payload_type, codec) = conversation
        .codec_broker_or_init(&session.codecs)
        .bind(&me, remote, &requested)?;

    let channel = conversation
        .connection()?
        .create_data_channel(&Uuid::new_v4().to_string())
        .await?;
    let mut handler = DataChannelEventHandler::new(remote.address().clone(), payload_type, codec);
    let opened = handler.attach(channel);
    conversation.set_data_handler(handler);
    session.notify(SessionNotification::DataChannel(conversation.id(), opened));

    let offer = offer(conversation).await?;
    let invitation = Message::invitation(
        me,
        remote.address(),
        conversation.id(),
        Demand::data_only(requested),
        offer,
    );

    log::trace!(target: "parley", "Inviting {} to a data channel in {}", remote.address(), conversation.id());
    conversation.send(invitation).await
}

/// Creates and applies a local offer, then reads it back from the connection
async fn offer(conversation: &Conversation) -> Result<SessionDescription, SessionError> {
    let connection = conversation.connection()?;
    let offer = connection.create_offer().await?;
    connection.set_local_description(offer).await?;
    connection
        .local_description()
        .ok_or_else(|| SessionError::transport("local description unavailable after it was set"))
}
