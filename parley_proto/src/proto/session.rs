//! The application-facing facade.
//!
//! A [`Session`] owns every [`Conversation`] by id. Conversations never point back at the session;
//! the event processors receive the session by reference when they run.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::proto::capabilities::{Credentials, MediaSource, TransportFactory};
use crate::proto::codec_broker::CodecCache;
use crate::proto::conversation::{Conversation, ConversationState, Participant, SignalingLink};
use crate::proto::directory::IdentityDirectory;
use crate::proto::event_processor::{caller, signaling_event};
use crate::proto::events::{
    InboundEvent, SessionNotification, SignalingInbox, TransportEventSender,
};
use crate::proto::identity::Identity;
use parking_lot::RwLock;
use parley_types::prelude::{Address, Demand, DemandValue, Message, MessageBody, PayloadType, RawDemand};
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// Cheap to clone. Every clone drives the same set of conversations
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) directory: IdentityDirectory,
    pub(crate) codecs: Arc<CodecCache>,
    pub(crate) transport: Arc<dyn TransportFactory>,
    pub(crate) media: Arc<dyn MediaSource>,
    own: RwLock<Option<Arc<Identity>>>,
    conversations: RwLock<Vec<(Uuid, ConversationHandle)>>,
    inbound_tx: UnboundedSender<InboundEvent>,
    kernel_tx: UnboundedSender<SessionNotification>,
}

impl Deref for Session {
    type Target = SessionInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub(crate) struct SessionParts {
    pub config: SessionConfig,
    pub directory: IdentityDirectory,
    pub codecs: Arc<CodecCache>,
    pub transport: Arc<dyn TransportFactory>,
    pub media: Arc<dyn MediaSource>,
    pub inbound_tx: UnboundedSender<InboundEvent>,
    pub kernel_tx: UnboundedSender<SessionNotification>,
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let SessionParts {
            config,
            directory,
            codecs,
            transport,
            media,
            inbound_tx,
            kernel_tx,
        } = parts;

        Self {
            inner: Arc::new(SessionInner {
                config,
                directory,
                codecs,
                transport,
                media,
                own: RwLock::new(None),
                conversations: RwLock::new(Vec::new()),
                inbound_tx,
                kernel_tx,
            }),
        }
    }

    /// Resolves `address`, attaches `credentials` and connects its signaling stub. Invitations
    /// arriving on that stub spawn new conversations
    pub async fn login(
        &self,
        address: impl Into<Address>,
        credentials: Option<Credentials>,
    ) -> Result<Arc<Identity>, SessionError> {
        let address = address.into();
        if address.is_empty() {
            return Err(SessionError::InvalidArgument("address must not be empty"));
        }

        self.directory.set_local(Some(address.clone()));
        let identity = self.directory.resolve(&address, credentials.clone()).await?;
        if credentials.is_some() {
            identity.set_credentials(credentials);
        }

        let credentials = identity.credentials();
        identity
            .stub()
            .connect(
                identity.address(),
                credentials.as_ref(),
                identity.signaling_server(),
                SignalingInbox::login(self.inbound_tx.clone()),
            )
            .await?;

        log::info!(target: "parley", "Logged in as {address} via {}", identity.signaling_server());
        *self.own.write() = Some(identity.clone());
        Ok(identity)
    }

    /// Hangs up every conversation and disconnects the login stub
    pub async fn logout(&self) -> Result<(), SessionError> {
        let identity = self.own_identity()?;
        if !self.conversations.read().is_empty() {
            let _ = self.hangup(None).await?;
        }

        *self.own.write() = None;
        self.directory.set_local(None);
        identity.stub().disconnect().await?;
        log::info!(target: "parley", "Logged out {}", identity.address());
        Ok(())
    }

    /// Invites `recipients` to a conversation and returns its id. An open conversation with the
    /// recipient, or the one named by `conversation_id`, is reused and its demand widened
    pub async fn call(
        &self,
        recipients: Vec<Address>,
        demand: impl Into<RawDemand>,
        conversation_id: Option<Uuid>,
    ) -> Result<Uuid, SessionError> {
        let recipient = match recipients.as_slice() {
            [] => return Err(SessionError::InvalidArgument("no recipients")),
            [recipient] => recipient.clone(),
            _ => {
                return Err(SessionError::InvalidArgument(
                    "multiparty conversations are not supported",
                ))
            }
        };

        let demand = Demand::normalize(demand);
        if demand.is_empty() {
            return Err(SessionError::InvalidArgument("demand requests no resource"));
        }

        let own = self.own_identity()?;
        let remote = self.directory.resolve(&recipient, None).await?;

        let existing = match conversation_id {
            Some(id) => Some(
                self.conversation(id)
                    .ok_or(SessionError::NoActiveSession("unknown conversation"))?,
            ),
            None => self.conversation_with(&recipient).await,
        };

        let handle = match existing {
            Some(handle) => handle,
            None => {
                self.create_conversation(
                    Uuid::new_v4(),
                    own.address().clone(),
                    Participant::new(own.clone(), &demand),
                )
                .await?
            }
        };

        let mut conversation = handle.lock().await;
        if conversation.is_closed() {
            return Err(SessionError::NoActiveSession("conversation is closed"));
        }

        if conversation
            .remote_participants()
            .iter()
            .any(|participant| participant.address() != &recipient)
        {
            return Err(SessionError::InvalidArgument(
                "multiparty conversations are not supported",
            ));
        }

        let id = conversation.id();
        log::trace!(target: "parley", "Calling {recipient} in conversation {id} with {demand:?}");
        let _ = conversation.my_participant_mut().update_demand(&demand, true);
        if !conversation.add_remote_participant(remote.clone(), &demand) {
            if let Some(participant) = conversation.remote_participant_mut(&recipient) {
                let _ = participant.update_demand(&demand, true);
            }
        }

        conversation.close_ice_gate();

        if conversation.signaling().is_none() {
            let link = self.signaling_link_for(&own, &remote, id).await?;
            conversation.attach_signaling(link);
        }

        conversation.set_state(ConversationState::Inviting);
        if demand.wants_media() {
            caller::invite_media(self, &mut conversation, &remote, &demand).await?;
        }

        if demand.wants_data() {
            caller::invite_data(self, &mut conversation, &remote, &demand).await?;
        }

        conversation.set_state(ConversationState::AwaitingAnswer);
        Ok(id)
    }

    /// Hangs up one conversation, or all of them when `conversation_id` is `None`
    pub async fn hangup(&self, conversation_id: Option<Uuid>) -> Result<bool, SessionError> {
        let targets = match conversation_id {
            Some(id) => vec![(
                id,
                self.conversation(id)
                    .ok_or(SessionError::NoActiveSession("unknown conversation"))?,
            )],
            None => self.conversations.read().clone(),
        };

        if targets.is_empty() {
            return Err(SessionError::NoActiveSession("no conversation to hang up"));
        }

        for (id, handle) in targets {
            let mut conversation = handle.lock().await;
            for participant in conversation.remote_participants() {
                let bye = Message::bye(conversation.me().clone(), participant.address(), id);
                if let Err(err) = conversation.send(bye).await {
                    log::warn!(target: "parley", "Unable to say bye to {}: {err}", participant.address());
                }
            }

            conversation.leave().await;
            drop(conversation);
            self.remove_conversation(id);
            log::trace!(target: "parley", "Hung up conversation {id}");
        }

        Ok(true)
    }

    /// Resumes an invitation that waits for a decision. Declining only notifies the caller; the
    /// conversation stays registered until it is hung up
    pub async fn answer_request(&self, message: &Message, accept: bool) -> Result<Uuid, SessionError> {
        let MessageBody::Invitation(negotiation) = &message.body else {
            return Err(SessionError::InvalidArgument("only invitations can be answered"));
        };

        let id = message.conversation_id;
        let handle = self
            .conversation(id)
            .ok_or(SessionError::NoActiveSession("unknown conversation"))?;
        let mut conversation = handle.lock().await;

        if accept {
            signaling_event::establish(self, &mut conversation, negotiation).await?;
        } else {
            let declined = Message::declined(conversation.me().clone(), message.from.clone(), id);
            conversation.send(declined).await?;
        }

        Ok(id)
    }

    /// Sends `payload` over the data channel of a conversation (the first one if `None`), encoded
    /// with the codec bound for `payload_type`
    pub async fn send_data(
        &self,
        payload: Value,
        payload_type: PayloadType,
        conversation_id: Option<Uuid>,
        to: Option<Address>,
    ) -> Result<bool, SessionError> {
        let handle = match conversation_id {
            Some(id) => self.conversation(id),
            None => self
                .conversations
                .read()
                .first()
                .map(|(_, handle)| handle.clone()),
        }
        .ok_or(SessionError::NoActiveSession("no conversation"))?;

        let conversation = handle.lock().await;
        let peer = match to {
            Some(peer) => peer,
            None => conversation.first_remote()?.address().clone(),
        };

        let handler = conversation
            .data_handler()
            .ok_or(SessionError::NoActiveSession("conversation has no data channel"))?;
        let codec = conversation
            .codec_broker()
            .and_then(|broker| {
                broker.lookup(conversation.me(), &peer, &DemandValue::from(&payload_type))
            })
            .map(|(_, binding)| binding.codec.clone())
            .ok_or(SessionError::NoActiveSession("no codec bound for this peer"))?;

        handler.send(&payload, codec.as_ref()).await?;
        Ok(true)
    }

    /// Widens (`allow`) or narrows the local demand and announces it with an `update` message
    pub async fn update_demand(
        &self,
        conversation_id: Uuid,
        demand: impl Into<RawDemand>,
        allow: bool,
    ) -> Result<Demand, SessionError> {
        let handle = self
            .conversation(conversation_id)
            .ok_or(SessionError::NoActiveSession("unknown conversation"))?;
        let mut conversation = handle.lock().await;
        let demand = conversation
            .my_participant_mut()
            .update_demand(demand, allow)
            .clone();

        for participant in conversation.remote_participants() {
            let update = Message::update(
                conversation.me().clone(),
                participant.address(),
                conversation_id,
                demand.clone(),
            );
            conversation.send(update).await?;
        }

        Ok(demand)
    }

    /// Announces `status` to every remote participant. Returns how many messages were sent
    pub async fn send_presence(&self, status: impl Into<String>) -> Result<usize, SessionError> {
        let _ = self.own_identity()?;
        let status = status.into();
        let mut sent = 0;

        let handles = self.conversations.read().clone();
        for (id, handle) in handles {
            let conversation = handle.lock().await;
            for participant in conversation.remote_participants() {
                let presence =
                    Message::presence(conversation.me().clone(), participant.address(), id, &status);
                conversation.send(presence).await?;
                sent += 1;
            }
        }

        Ok(sent)
    }

    /// Stops the executor once the events queued so far are processed
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.inbound_tx.send(InboundEvent::Shutdown)?;
        Ok(())
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.own.read().clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn directory(&self) -> &IdentityDirectory {
        &self.directory
    }

    pub fn conversation_ids(&self) -> Vec<Uuid> {
        self.conversations.read().iter().map(|(id, _)| *id).collect()
    }

    pub fn conversation(&self, id: Uuid) -> Option<ConversationHandle> {
        self.conversations
            .read()
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, handle)| handle.clone())
    }

    pub(crate) fn own_identity(&self) -> Result<Arc<Identity>, SessionError> {
        self.identity()
            .ok_or(SessionError::NoActiveSession("not logged in"))
    }

    pub(crate) fn notify(&self, notification: SessionNotification) {
        if let Err(err) = self.kernel_tx.send(notification) {
            log::warn!(target: "parley", "Kernel is gone, dropping {:?}", err.0);
        }
    }

    /// Registers a new conversation and creates its transport connection
    pub(crate) async fn create_conversation(
        &self,
        id: Uuid,
        owner: Address,
        my_participant: Participant,
    ) -> Result<ConversationHandle, SessionError> {
        let events = TransportEventSender::new(id, self.inbound_tx.clone());
        let connection = self
            .transport
            .create(&self.config.ice_servers, events.clone())
            .await?;

        let mut conversation = Conversation::new(id, owner, my_participant, events);
        conversation.set_connection(connection);

        let handle = Arc::new(Mutex::new(conversation));
        self.conversations.write().push((id, handle.clone()));
        log::trace!(target: "parley", "Created conversation {id}");
        Ok(handle)
    }

    pub(crate) fn remove_conversation(&self, id: Uuid) {
        self.conversations.write().retain(|(cid, _)| *cid != id);
    }

    async fn conversation_with(&self, peer: &Address) -> Option<ConversationHandle> {
        let handles = self.conversations.read().clone();
        for (_, handle) in handles {
            let conversation = handle.lock().await;
            if !conversation.is_closed() && conversation.remote_participant(peer).is_some() {
                drop(conversation);
                return Some(handle);
            }
        }

        None
    }

    /// Shares the login stub when both ends use the same messaging server. Otherwise connects a
    /// fresh stub of the peer's implementation to the peer's server
    async fn signaling_link_for(
        &self,
        own: &Identity,
        remote: &Identity,
        conversation_id: Uuid,
    ) -> Result<SignalingLink, SessionError> {
        if own.shares_server_with(remote) {
            return Ok(SignalingLink::Shared(own.stub().clone()));
        }

        log::trace!(target: "parley", "{} lives on {}, connecting a dedicated stub", remote.address(), remote.signaling_server());
        let stub = remote.fresh_stub()?;
        let credentials = remote.credentials();
        stub.connect(
            own.address(),
            credentials.as_ref(),
            remote.signaling_server(),
            SignalingInbox::conversation(conversation_id, self.inbound_tx.clone()),
        )
        .await?;

        Ok(SignalingLink::Dedicated(stub))
    }
}
