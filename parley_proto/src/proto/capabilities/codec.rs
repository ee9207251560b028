use crate::error::SessionError;
use bytes::Bytes;
use serde_json::Value;

/// Turns application payloads into data channel frames and back
pub trait Codec: Send + Sync {
    fn encode(&self, payload: &Value) -> Result<Bytes, SessionError>;
    fn decode(&self, frame: &[u8]) -> Result<Value, SessionError>;
}

/// JSON text frames
#[derive(Default, Debug, Copy, Clone)]
pub struct PlainCodec;

impl Codec for PlainCodec {
    fn encode(&self, payload: &Value) -> Result<Bytes, SessionError> {
        Ok(Bytes::from(serde_json::to_vec(payload)?))
    }

    fn decode(&self, frame: &[u8]) -> Result<Value, SessionError> {
        Ok(serde_json::from_slice(frame)?)
    }
}
