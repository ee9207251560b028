use crate::config::IceServer;
use crate::error::SessionError;
use crate::proto::events::TransportEventSender;
use async_trait::async_trait;
use bytes::Bytes;
use parley_types::prelude::{IceCandidate, MediaStream, MediaTrack, SessionDescription};
use std::fmt::Debug;
use std::sync::Arc;

/// Creates one peer connection per conversation
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Callbacks of the returned connection must be delivered through `events`
    async fn create(
        &self,
        ice_servers: &[IceServer],
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerConnection>, SessionError>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, SessionError>;
    async fn create_answer(&self) -> Result<SessionDescription, SessionError>;
    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError>;
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError>;
    /// Must reflect the last successful [`Self::set_local_description`] as soon as it returns
    fn local_description(&self) -> Option<SessionDescription>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError>;
    async fn add_track(&self, track: MediaTrack, stream: &MediaStream) -> Result<(), SessionError>;
    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, SessionError>;
    async fn close(&self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait DataChannel: Send + Sync + Debug {
    fn label(&self) -> &str;
    async fn send(&self, payload: Bytes) -> Result<(), SessionError>;
    async fn close(&self) -> Result<(), SessionError>;
}
