//! The signaling envelope exchanged between two sessions through a messaging server.
//!
//! On the wire a message is `{id, from, to, type, conversationId, misc?}` where the shape of
//! `misc` depends on `type`. In memory the pair `type`/`misc` is a single [`MessageBody`], so a
//! message that parses is guaranteed to carry the payload its type requires.

use crate::demand::Demand;
use crate::errors::Error;
use crate::media::{CandidatePayload, IceCandidate, SessionDescription};
use crate::user::{Address, Destination};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum MessageType {
    Invitation,
    Accepted,
    Declined,
    Bye,
    Update,
    UpdateSdp,
    Updated,
    Presence,
    Message,
    ConnectivityCandidate,
}

/// `misc` of `invitation` and `accepted`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub demand: Demand,
    #[serde(
        rename = "sessionDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_description: Option<SessionDescription>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct DemandUpdate {
    demand: Demand,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SdpUpdate {
    sdp: SessionDescription,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct PresenceUpdate {
    status: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    Invitation(Negotiation),
    Accepted(Negotiation),
    Declined,
    Bye,
    Update { demand: Demand },
    UpdateSdp { sdp: SessionDescription },
    Updated,
    Presence { status: String },
    Message(Value),
    ConnectivityCandidate(CandidatePayload),
    /// A type this implementation does not know. Kept so it can still reach the application
    Unknown { kind: String, misc: Option<Value> },
}

impl MessageBody {
    /// `None` for [`MessageBody::Unknown`]
    pub fn message_type(&self) -> Option<MessageType> {
        Some(match self {
            MessageBody::Invitation(_) => MessageType::Invitation,
            MessageBody::Accepted(_) => MessageType::Accepted,
            MessageBody::Declined => MessageType::Declined,
            MessageBody::Bye => MessageType::Bye,
            MessageBody::Update { .. } => MessageType::Update,
            MessageBody::UpdateSdp { .. } => MessageType::UpdateSdp,
            MessageBody::Updated => MessageType::Updated,
            MessageBody::Presence { .. } => MessageType::Presence,
            MessageBody::Message(_) => MessageType::Message,
            MessageBody::ConnectivityCandidate(_) => MessageType::ConnectivityCandidate,
            MessageBody::Unknown { .. } => return None,
        })
    }

    pub fn type_name(&self) -> &str {
        match self {
            MessageBody::Unknown { kind, .. } => kind.as_str(),
            body => body
                .message_type()
                .map(<&'static str>::from)
                .unwrap_or_default(),
        }
    }

    fn into_wire(self) -> (String, Option<Value>) {
        let kind = self.type_name().to_string();
        let misc = match self {
            MessageBody::Invitation(negotiation) | MessageBody::Accepted(negotiation) => {
                serde_json::to_value(negotiation).ok()
            }
            MessageBody::Update { demand } => serde_json::to_value(DemandUpdate { demand }).ok(),
            MessageBody::UpdateSdp { sdp } => serde_json::to_value(SdpUpdate { sdp }).ok(),
            MessageBody::Presence { status } => {
                serde_json::to_value(PresenceUpdate { status }).ok()
            }
            MessageBody::Message(payload) => Some(payload),
            MessageBody::ConnectivityCandidate(payload) => Some(payload.into()),
            MessageBody::Unknown { misc, .. } => misc,
            MessageBody::Declined | MessageBody::Bye | MessageBody::Updated => None,
        };

        (kind, misc)
    }

    fn from_wire(kind: String, misc: Option<Value>) -> Result<Self, Error> {
        let Ok(message_type) = MessageType::from_str(&kind) else {
            return Ok(MessageBody::Unknown { kind, misc });
        };

        let name: &'static str = message_type.into();
        let required = |misc: Option<Value>| misc.ok_or(Error::MissingPayload(name));
        let malformed = |err: serde_json::Error| Error::MalformedPayload {
            kind: name,
            reason: err.to_string(),
        };

        Ok(match message_type {
            MessageType::Invitation => MessageBody::Invitation(
                serde_json::from_value(required(misc)?).map_err(malformed)?,
            ),
            MessageType::Accepted => MessageBody::Accepted(
                serde_json::from_value(required(misc)?).map_err(malformed)?,
            ),
            MessageType::Declined => MessageBody::Declined,
            MessageType::Bye => MessageBody::Bye,
            MessageType::Update => {
                let update: DemandUpdate =
                    serde_json::from_value(required(misc)?).map_err(malformed)?;
                MessageBody::Update {
                    demand: update.demand,
                }
            }
            MessageType::UpdateSdp => {
                let update: SdpUpdate =
                    serde_json::from_value(required(misc)?).map_err(malformed)?;
                MessageBody::UpdateSdp { sdp: update.sdp }
            }
            MessageType::Updated => MessageBody::Updated,
            MessageType::Presence => {
                let update: PresenceUpdate =
                    serde_json::from_value(required(misc)?).map_err(malformed)?;
                MessageBody::Presence {
                    status: update.status,
                }
            }
            MessageType::Message => MessageBody::Message(misc.unwrap_or(Value::Null)),
            MessageType::ConnectivityCandidate => {
                MessageBody::ConnectivityCandidate(CandidatePayload::try_from(required(misc)?)?)
            }
        })
    }
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    id: Uuid,
    from: Address,
    to: Destination,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "conversationId")]
    conversation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    misc: Option<Value>,
}

/// A signaling message. Every constructor generates a fresh `id`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    pub id: Uuid,
    pub from: Address,
    pub to: Destination,
    pub conversation_id: Uuid,
    pub body: MessageBody,
}

impl TryFrom<WireMessage> for Message {
    type Error = Error;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            id: wire.id,
            from: wire.from,
            to: wire.to,
            conversation_id: wire.conversation_id,
            body: MessageBody::from_wire(wire.kind, wire.misc)?,
        })
    }
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        let (kind, misc) = message.body.into_wire();
        Self {
            id: message.id,
            from: message.from,
            to: message.to,
            kind,
            conversation_id: message.conversation_id,
            misc,
        }
    }
}

impl Message {
    pub fn new(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        body: MessageBody,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to: to.into(),
            conversation_id,
            body,
        }
    }

    pub fn invitation(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        demand: Demand,
        session_description: SessionDescription,
    ) -> Self {
        Self::new(
            from,
            to,
            conversation_id,
            MessageBody::Invitation(Negotiation {
                demand,
                session_description: Some(session_description),
            }),
        )
    }

    pub fn accepted(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        demand: Demand,
        session_description: SessionDescription,
    ) -> Self {
        Self::new(
            from,
            to,
            conversation_id,
            MessageBody::Accepted(Negotiation {
                demand,
                session_description: Some(session_description),
            }),
        )
    }

    pub fn declined(from: Address, to: impl Into<Destination>, conversation_id: Uuid) -> Self {
        Self::new(from, to, conversation_id, MessageBody::Declined)
    }

    pub fn bye(from: Address, to: impl Into<Destination>, conversation_id: Uuid) -> Self {
        Self::new(from, to, conversation_id, MessageBody::Bye)
    }

    pub fn update(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        demand: Demand,
    ) -> Self {
        Self::new(from, to, conversation_id, MessageBody::Update { demand })
    }

    pub fn update_sdp(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        sdp: SessionDescription,
    ) -> Self {
        Self::new(from, to, conversation_id, MessageBody::UpdateSdp { sdp })
    }

    pub fn updated(from: Address, to: impl Into<Destination>, conversation_id: Uuid) -> Self {
        Self::new(from, to, conversation_id, MessageBody::Updated)
    }

    pub fn presence(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        status: impl Into<String>,
    ) -> Self {
        Self::new(
            from,
            to,
            conversation_id,
            MessageBody::Presence {
                status: status.into(),
            },
        )
    }

    pub fn candidate(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        candidate: IceCandidate,
    ) -> Self {
        Self::new(
            from,
            to,
            conversation_id,
            MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(candidate)),
        )
    }

    pub fn last_candidate(from: Address, to: impl Into<Destination>, conversation_id: Uuid) -> Self {
        Self::new(
            from,
            to,
            conversation_id,
            MessageBody::ConnectivityCandidate(CandidatePayload::Last),
        )
    }

    pub fn text(
        from: Address,
        to: impl Into<Destination>,
        conversation_id: Uuid,
        payload: Value,
    ) -> Self {
        Self::new(from, to, conversation_id, MessageBody::Message(payload))
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.body.message_type()
    }
}
