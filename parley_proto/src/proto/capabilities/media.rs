use crate::error::SessionError;
use async_trait::async_trait;
use parley_types::prelude::{DirectionalDemand, MediaStream};

/// Local capture devices
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Captures the audio and video tracks requested by `demand`
    async fn acquire(&self, demand: &DirectionalDemand) -> Result<MediaStream, SessionError>;
}
