//! A kernel that forwards every callback of the executor over an unbounded channel, so an
//! application (or a test) can consume session events as a plain stream instead of implementing
//! [`SessionKernel`] itself.
//!
//! ```rust,no_run
//! use parley_sdk::prelude::*;
//!
//! # async fn run(mut builder: SessionBuilder) -> anyhow::Result<()> {
//! let (kernel, mut events) = ChannelKernel::new();
//! let executor = builder.build(kernel)?;
//! let session = executor.session();
//! let _runner = tokio::spawn(executor.execute());
//!
//! while let Some(event) = events.recv().await {
//!     if let KernelEvent::Message(message) = event {
//!         if matches!(message.body, MessageBody::Invitation(_)) {
//!             let _ = session.answer_request(&message, true).await?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One callback of the executor
#[derive(Debug)]
pub enum KernelEvent {
    Started,
    Message(Message),
    Transport(Uuid, TransportEvent),
    DataChannel(Uuid, DataChannelEvent),
    Error(Option<Uuid>, SessionError),
    Stopped,
}

pub struct ChannelKernel {
    session: Option<Session>,
    tx: UnboundedSender<KernelEvent>,
}

impl ChannelKernel {
    pub fn new() -> (Self, UnboundedReceiver<KernelEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { session: None, tx }, rx)
    }

    /// Available once the executor started
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The receiving half may be dropped at any time; later events are discarded
    fn forward(&self, event: KernelEvent) {
        if let Err(err) = self.tx.send(event) {
            log::trace!(target: "parley", "[ChannelKernel] Receiver dropped, discarding {:?}", err.0);
        }
    }
}

#[async_trait]
impl SessionKernel for ChannelKernel {
    fn load_session(&mut self, session: Session) -> Result<(), SessionError> {
        self.session = Some(session);
        Ok(())
    }

    async fn on_start(&self) -> Result<(), SessionError> {
        self.forward(KernelEvent::Started);
        Ok(())
    }

    async fn on_message(&self, message: Message) -> Result<(), SessionError> {
        self.forward(KernelEvent::Message(message));
        Ok(())
    }

    async fn on_transport_event(
        &self,
        conversation_id: Uuid,
        event: TransportEvent,
    ) -> Result<(), SessionError> {
        self.forward(KernelEvent::Transport(conversation_id, event));
        Ok(())
    }

    async fn on_data_channel_event(
        &self,
        conversation_id: Uuid,
        event: DataChannelEvent,
    ) -> Result<(), SessionError> {
        self.forward(KernelEvent::DataChannel(conversation_id, event));
        Ok(())
    }

    async fn on_error(
        &self,
        conversation_id: Option<Uuid>,
        error: SessionError,
    ) -> Result<(), SessionError> {
        self.forward(KernelEvent::Error(conversation_id, error));
        Ok(())
    }

    async fn on_stop(&mut self) -> Result<(), SessionError> {
        self.forward(KernelEvent::Stopped);
        self.session = None;
        Ok(())
    }
}
