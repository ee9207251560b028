use crate::error::SessionError;
use crate::proto::capabilities::{Codec, DataChannel};
use crate::proto::events::DataChannelEvent;
use parley_types::prelude::{Address, PayloadType};
use serde_json::Value;
use std::sync::Arc;

/// Moves application payloads over the data channels of one conversation, encoding and decoding
/// them with the codec negotiated for the peer
#[derive(Clone)]
pub struct DataChannelEventHandler {
    peer: Address,
    payload_type: PayloadType,
    codec: Arc<dyn Codec>,
    channels: Vec<Arc<dyn DataChannel>>,
}

impl DataChannelEventHandler {
    pub fn new(peer: Address, payload_type: PayloadType, codec: Arc<dyn Codec>) -> Self {
        Self {
            peer,
            payload_type,
            codec,
            channels: Vec::new(),
        }
    }

    pub fn peer(&self) -> &Address {
        &self.peer
    }

    pub fn payload_type(&self) -> &PayloadType {
        &self.payload_type
    }

    /// Starts routing traffic of `channel` through this handler. Returns the open notification
    pub fn attach(&mut self, channel: Arc<dyn DataChannel>) -> DataChannelEvent {
        let label = channel.label().to_string();
        if !self.routes(&label) {
            self.channels.push(channel);
        }

        DataChannelEvent::Opened {
            label,
            peer: self.peer.clone(),
        }
    }

    pub fn routes(&self, label: &str) -> bool {
        self.channels.iter().any(|channel| channel.label() == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|channel| channel.label().to_string())
            .collect()
    }

    /// Decodes an inbound frame. `codec` overrides the handler's own codec when the broker holds
    /// a more specific binding
    pub fn on_frame(
        &self,
        label: &str,
        frame: &[u8],
        codec: Option<(PayloadType, Arc<dyn Codec>)>,
    ) -> Result<DataChannelEvent, SessionError> {
        let (payload_type, codec) =
            codec.unwrap_or_else(|| (self.payload_type.clone(), self.codec.clone()));

        Ok(DataChannelEvent::Message {
            label: label.to_string(),
            from: self.peer.clone(),
            payload_type,
            payload: codec.decode(frame)?,
        })
    }

    /// Returns the close notification if `label` was routed here
    pub fn on_close(&mut self, label: &str) -> Option<DataChannelEvent> {
        let before = self.channels.len();
        self.channels.retain(|channel| channel.label() != label);

        (self.channels.len() != before).then(|| DataChannelEvent::Closed {
            label: label.to_string(),
        })
    }

    /// Encodes `payload` with `codec` and writes it to the most recently opened channel
    pub async fn send(&self, payload: &Value, codec: &dyn Codec) -> Result<(), SessionError> {
        let channel = self
            .channels
            .last()
            .ok_or(SessionError::NoActiveSession("no open data channel"))?;
        let frame = codec.encode(payload)?;
        channel.send(frame).await
    }

    /// Closes every channel. Failures are logged and skipped
    pub async fn close(&mut self) {
        for channel in self.channels.drain(..) {
            if let Err(err) = channel.close().await {
                log::warn!(target: "parley", "Unable to close data channel {}: {err}", channel.label());
            }
        }
    }
}
