use crate::error::SessionError;
use crate::proto::capabilities::{PeerConnection, SignalingStub};
use crate::proto::codec_broker::{CodecBroker, CodecCache};
use crate::proto::data_channel::DataChannelEventHandler;
use crate::proto::events::TransportEventSender;
use crate::proto::identity::Identity;
use itertools::Itertools;
use parley_types::prelude::{Address, Demand, Message, RawDemand};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConversationState {
    Created,
    /// The caller is preparing its offer
    Inviting,
    /// The invitation was sent, the answer has not arrived yet
    AwaitingAnswer,
    /// An invitation waits for the application to accept or decline it
    Deciding,
    Established,
    Closed,
}

/// An identity taking part in a conversation
#[derive(Clone)]
pub struct Participant {
    identity: Arc<Identity>,
    demand: Demand,
    connection: Option<Arc<dyn PeerConnection>>,
}

impl Participant {
    pub fn new(identity: Arc<Identity>, demand: impl Into<RawDemand>) -> Self {
        Self {
            identity,
            demand: Demand::normalize(demand),
            connection: None,
        }
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn address(&self) -> &Address {
        self.identity.address()
    }

    pub fn demand(&self) -> &Demand {
        &self.demand
    }

    pub fn connection(&self) -> Option<&Arc<dyn PeerConnection>> {
        self.connection.as_ref()
    }

    pub(crate) fn set_connection(&mut self, connection: Arc<dyn PeerConnection>) {
        self.connection = Some(connection);
    }

    /// Widens (`allow`) or narrows the demand, returning the new value
    pub fn update_demand(&mut self, demand: impl Into<RawDemand>, allow: bool) -> &Demand {
        self.demand = if allow {
            Demand::merge_allow(&self.demand, demand)
        } else {
            Demand::merge_disallow(&self.demand, demand)
        };
        &self.demand
    }
}

/// The stub a conversation signals through
#[derive(Clone)]
pub enum SignalingLink {
    /// The logged-in identity's own stub
    Shared(Arc<dyn SignalingStub>),
    /// A stub connected for this conversation only, because the peer lives on another server
    Dedicated(Arc<dyn SignalingStub>),
}

impl SignalingLink {
    pub fn stub(&self) -> &Arc<dyn SignalingStub> {
        match self {
            SignalingLink::Shared(stub) | SignalingLink::Dedicated(stub) => stub,
        }
    }

    pub fn is_dedicated(&self) -> bool {
        matches!(self, SignalingLink::Dedicated(_))
    }
}

/// One session between the local participant and its remote participants
pub struct Conversation {
    id: Uuid,
    state: ConversationState,
    owner: Address,
    my_participant: Participant,
    remote_participants: Vec<Participant>,
    signaling: Option<SignalingLink>,
    events: TransportEventSender,
    codec_broker: Option<CodecBroker>,
    data_handler: Option<DataChannelEventHandler>,
    ice: bool,
    candidate_buffer: Vec<Message>,
}

impl Conversation {
    /// `owner` is the address of whoever started the conversation
    pub fn new(
        id: Uuid,
        owner: Address,
        my_participant: Participant,
        events: TransportEventSender,
    ) -> Self {
        Self {
            id,
            state: ConversationState::Created,
            owner,
            my_participant,
            remote_participants: Vec::new(),
            signaling: None,
            events,
            codec_broker: None,
            data_handler: None,
            ice: false,
            candidate_buffer: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConversationState) {
        if self.state != ConversationState::Closed {
            log::trace!(target: "parley", "Conversation {}: {:?} -> {:?}", self.id, self.state, state);
            self.state = state;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConversationState::Closed
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn my_participant(&self) -> &Participant {
        &self.my_participant
    }

    pub fn my_participant_mut(&mut self) -> &mut Participant {
        &mut self.my_participant
    }

    pub fn me(&self) -> &Address {
        self.my_participant.address()
    }

    pub fn remote_participants(&self) -> &[Participant] {
        &self.remote_participants
    }

    pub fn remote_participant(&self, address: &Address) -> Option<&Participant> {
        self.remote_participants
            .iter()
            .find(|participant| participant.address() == address)
    }

    /// The peer every one-to-one flow talks to
    pub fn first_remote(&self) -> Result<&Participant, SessionError> {
        self.remote_participants
            .first()
            .ok_or(SessionError::NoActiveSession("conversation has no remote participant"))
    }

    /// Adds `identity` unless it is already a member. Returns whether it was added
    pub fn add_remote_participant(&mut self, identity: Arc<Identity>, demand: impl Into<RawDemand>) -> bool {
        if self.remote_participant(identity.address()).is_some() {
            return false;
        }

        self.remote_participants.push(Participant::new(identity, demand));
        true
    }

    pub fn remote_participant_mut(&mut self, address: &Address) -> Option<&mut Participant> {
        self.remote_participants
            .iter_mut()
            .find(|participant| participant.address() == address)
    }

    pub(crate) fn set_connection(&mut self, connection: Arc<dyn PeerConnection>) {
        self.my_participant.set_connection(connection);
    }

    pub fn connection(&self) -> Result<Arc<dyn PeerConnection>, SessionError> {
        self.my_participant
            .connection()
            .cloned()
            .ok_or(SessionError::NoActiveSession("conversation has no transport connection"))
    }

    pub fn events(&self) -> &TransportEventSender {
        &self.events
    }

    pub fn signaling(&self) -> Option<&SignalingLink> {
        self.signaling.as_ref()
    }

    pub(crate) fn attach_signaling(&mut self, link: SignalingLink) {
        self.signaling = Some(link);
    }

    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        let link = self
            .signaling
            .as_ref()
            .ok_or(SessionError::NoActiveSession("conversation has no signaling stub"))?;
        link.stub().send_message(message).await
    }

    pub fn ice(&self) -> bool {
        self.ice
    }

    /// Holds back local candidates until the running offer/answer exchange completes
    pub(crate) fn close_ice_gate(&mut self) {
        self.ice = false;
    }

    /// Opens the gate and sends every held candidate, most recently queued first
    pub(crate) async fn open_ice_gate(&mut self) -> Result<(), SessionError> {
        self.ice = true;
        while let Some(candidate) = self.candidate_buffer.pop() {
            self.send(candidate).await?;
        }

        Ok(())
    }

    /// Sends `candidate` right away if the gate is open, otherwise holds it back
    pub(crate) async fn relay_candidate(&mut self, candidate: Message) -> Result<(), SessionError> {
        if self.ice {
            self.send(candidate).await?;
            self.open_ice_gate().await
        } else {
            self.candidate_buffer.push(candidate);
            Ok(())
        }
    }

    pub fn buffered_candidates(&self) -> &[Message] {
        &self.candidate_buffer
    }

    pub fn codec_broker(&self) -> Option<&CodecBroker> {
        self.codec_broker.as_ref()
    }

    pub(crate) fn codec_broker_or_init(&mut self, cache: &Arc<CodecCache>) -> &mut CodecBroker {
        self.codec_broker
            .get_or_insert_with(|| CodecBroker::new(cache.clone()))
    }

    pub fn data_handler(&self) -> Option<&DataChannelEventHandler> {
        self.data_handler.as_ref()
    }

    pub(crate) fn data_handler_mut(&mut self) -> Option<&mut DataChannelEventHandler> {
        self.data_handler.as_mut()
    }

    pub(crate) fn set_data_handler(&mut self, handler: DataChannelEventHandler) {
        self.data_handler = Some(handler);
    }

    /// Closes every transport connection and data channel, and disconnects a dedicated stub.
    /// Missing pieces are skipped and failures only logged
    pub async fn leave(&mut self) {
        if let Some(mut handler) = self.data_handler.take() {
            handler.close().await;
        }

        let connections = std::iter::once(&self.my_participant)
            .chain(self.remote_participants.iter())
            .filter_map(|participant| participant.connection().cloned())
            .unique_by(|connection| Arc::as_ptr(connection) as *const ())
            .collect::<Vec<_>>();

        for connection in connections {
            if let Err(err) = connection.close().await {
                log::warn!(target: "parley", "Conversation {}: unable to close transport: {err}", self.id);
            }
        }

        if let Some(SignalingLink::Dedicated(stub)) = &self.signaling {
            if let Err(err) = stub.disconnect().await {
                log::warn!(target: "parley", "Conversation {}: unable to disconnect stub: {err}", self.id);
            }
        }

        self.candidate_buffer.clear();
        self.set_state(ConversationState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::events::inbox;
    use crate::proto::testing::{identity, NullStub, RecordingStub};
    use parley_types::prelude::{CandidatePayload, IceCandidate, MessageBody};

    fn conversation(stub: Arc<RecordingStub>, link: fn(Arc<dyn SignalingStub>) -> SignalingLink) -> Conversation {
        let (tx, _rx) = inbox();
        let id = Uuid::new_v4();
        let alice = identity("alice@a.example", &[], stub.clone());
        let mut conversation = Conversation::new(
            id,
            alice.address().clone(),
            Participant::new(alice, "audio"),
            TransportEventSender::new(id, tx),
        );
        conversation.attach_signaling(link(stub));
        conversation
    }

    fn candidate(conversation: &Conversation, n: usize) -> Message {
        Message::candidate(
            conversation.me().clone(),
            Address::from("bob@a.example"),
            conversation.id(),
            IceCandidate::new(format!("candidate:{n}"), None, Some(0)),
        )
    }

    fn candidate_text(message: &Message) -> Option<String> {
        match &message.body {
            MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(candidate)) => {
                Some(candidate.candidate.clone())
            }
            _ => None,
        }
    }

    #[test]
    fn remote_participants_are_deduplicated() {
        let mut conversation = conversation(Arc::new(RecordingStub::default()), SignalingLink::Shared);
        let bob = identity("bob@a.example", &[], Arc::new(NullStub));

        assert!(conversation.add_remote_participant(bob.clone(), "audio"));
        assert!(!conversation.add_remote_participant(bob, "video"));
        assert_eq!(conversation.remote_participants().len(), 1);
        assert!(conversation.remote_participants()[0].demand().incoming.audio.is_requested());
    }

    #[tokio::test]
    async fn candidates_wait_for_the_gate() {
        let stub = Arc::new(RecordingStub::default());
        let mut conversation = conversation(stub.clone(), SignalingLink::Shared);

        for n in 0..3 {
            let candidate = candidate(&conversation, n);
            conversation.relay_candidate(candidate).await.unwrap();
        }
        assert!(stub.sent.lock().is_empty());
        assert_eq!(conversation.buffered_candidates().len(), 3);

        conversation.open_ice_gate().await.unwrap();
        assert!(conversation.ice());
        assert!(conversation.buffered_candidates().is_empty());
        let sent = stub.sent.lock().iter().filter_map(candidate_text).collect::<Vec<_>>();
        assert_eq!(sent, vec!["candidate:2", "candidate:1", "candidate:0"]);

        let late = candidate(&conversation, 3);
        conversation.relay_candidate(late).await.unwrap();
        assert_eq!(stub.sent.lock().len(), 4);
    }

    #[tokio::test]
    async fn leave_disconnects_dedicated_stubs_only() {
        let shared = Arc::new(RecordingStub::default());
        let mut conversation = conversation(shared.clone(), SignalingLink::Shared);
        conversation.leave().await;
        assert!(conversation.is_closed());
        assert_eq!(*shared.disconnects.lock(), 0);

        conversation.set_state(ConversationState::Established);
        assert!(conversation.is_closed());

        let dedicated = Arc::new(RecordingStub::default());
        let mut conversation = self::conversation(dedicated.clone(), SignalingLink::Dedicated);
        conversation.leave().await;
        assert_eq!(*dedicated.disconnects.lock(), 1);
    }
}
