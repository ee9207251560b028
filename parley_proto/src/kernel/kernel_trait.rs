use crate::error::SessionError;
use crate::proto::events::{DataChannelEvent, TransportEvent};
use crate::proto::session::Session;
use async_trait::async_trait;
use auto_impl::auto_impl;
use parley_types::prelude::Message;
use uuid::Uuid;

/// The [`SessionKernel`] is the interface between the protocol core and your application. Every
/// callback is invoked from the executor's event loop, one at a time and in the order the events
/// were produced
#[async_trait]
#[auto_impl(Box, &mut)]
pub trait SessionKernel: Send + Sync {
    /// When the executor starts, it hands the kernel a handle to the session
    fn load_session(&mut self, session: Session) -> Result<(), SessionError>;
    /// Called once after [`Self::load_session`] so the application can log in and place calls.
    /// Runs alongside the event loop
    async fn on_start(&self) -> Result<(), SessionError> {
        Ok(())
    }
    /// Every signaling message after the core processed it, including invitations waiting for
    /// [`Session::answer_request`]
    async fn on_message(&self, _message: Message) -> Result<(), SessionError> {
        Ok(())
    }
    /// Every transport callback except data channel traffic
    async fn on_transport_event(
        &self,
        _conversation_id: Uuid,
        _event: TransportEvent,
    ) -> Result<(), SessionError> {
        Ok(())
    }
    async fn on_data_channel_event(
        &self,
        _conversation_id: Uuid,
        _event: DataChannelEvent,
    ) -> Result<(), SessionError> {
        Ok(())
    }
    /// Failures of the event loop, which has no caller to return them to. The loop keeps running
    async fn on_error(
        &self,
        _conversation_id: Option<Uuid>,
        _error: SessionError,
    ) -> Result<(), SessionError> {
        Ok(())
    }
    /// When the executor is ready to shut down, this is called
    async fn on_stop(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
