use crate::error::SessionError;
use crate::proto::capabilities::DataChannel;
use bytes::Bytes;
use parley_types::prelude::{Address, IceCandidate, MediaStream, MediaTrack, Message, PayloadType};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Everything the executor consumes, in arrival order
#[derive(Debug)]
pub enum InboundEvent {
    Signaling {
        /// `Some` when the message arrived on a stub dedicated to one conversation
        bound_to: Option<Uuid>,
        message: Message,
    },
    Transport {
        conversation_id: Uuid,
        event: TransportEvent,
    },
    Shutdown,
}

pub(crate) fn inbox() -> (
    UnboundedSender<InboundEvent>,
    UnboundedReceiver<InboundEvent>,
) {
    unbounded_channel()
}

/// Everything the executor hands to the kernel, in the order it was produced
#[derive(Debug)]
pub(crate) enum SessionNotification {
    Message(Message),
    Transport(Uuid, TransportEvent),
    DataChannel(Uuid, DataChannelEvent),
    Error(Option<Uuid>, SessionError),
}

/// Handed to [`SignalingStub::connect`](crate::proto::capabilities::SignalingStub::connect).
/// The stub pushes every decoded message it receives into it
#[derive(Clone, Debug)]
pub struct SignalingInbox {
    bound_to: Option<Uuid>,
    tx: UnboundedSender<InboundEvent>,
}

impl SignalingInbox {
    pub(crate) fn login(tx: UnboundedSender<InboundEvent>) -> Self {
        Self { bound_to: None, tx }
    }

    pub(crate) fn conversation(conversation_id: Uuid, tx: UnboundedSender<InboundEvent>) -> Self {
        Self {
            bound_to: Some(conversation_id),
            tx,
        }
    }

    pub fn deliver(&self, message: Message) -> Result<(), SessionError> {
        self.tx.send(InboundEvent::Signaling {
            bound_to: self.bound_to,
            message,
        })?;
        Ok(())
    }

    pub fn bound_to(&self) -> Option<Uuid> {
        self.bound_to
    }
}

/// Callbacks of one peer connection. Each conversation owns exactly one sender
#[derive(Clone, Debug)]
pub struct TransportEventSender {
    conversation_id: Uuid,
    tx: UnboundedSender<InboundEvent>,
}

impl TransportEventSender {
    pub(crate) fn new(conversation_id: Uuid, tx: UnboundedSender<InboundEvent>) -> Self {
        Self { conversation_id, tx }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn send(&self, event: TransportEvent) -> Result<(), SessionError> {
        self.tx.send(InboundEvent::Transport {
            conversation_id: self.conversation_id,
            event,
        })?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum TransportEvent {
    NegotiationNeeded,
    /// `None` marks the end of candidate gathering
    IceCandidate(Option<IceCandidate>),
    TrackAdded {
        track: MediaTrack,
        stream_id: String,
    },
    /// Raised by the session itself once local media was attached
    LocalStreamAdded(MediaStream),
    /// The remote peer opened a data channel
    DataChannelOpened(Arc<dyn DataChannel>),
    DataChannelMessage {
        label: String,
        payload: Bytes,
    },
    DataChannelClosed {
        label: String,
    },
    SignalingStateChanged(String),
    IceConnectionStateChanged(String),
}

impl TransportEvent {
    /// Data channel traffic is reported through [`DataChannelEvent`] instead
    pub fn is_data_channel_traffic(&self) -> bool {
        matches!(
            self,
            TransportEvent::DataChannelMessage { .. } | TransportEvent::DataChannelClosed { .. }
        )
    }
}

/// What the application sees of a data channel
#[derive(Clone, Debug, PartialEq)]
pub enum DataChannelEvent {
    Opened {
        label: String,
        peer: Address,
    },
    Message {
        label: String,
        from: Address,
        payload_type: PayloadType,
        payload: Value,
    },
    Closed {
        label: String,
    },
}
