use crate::error::SessionError;
use crate::proto::events::SignalingInbox;
use async_trait::async_trait;
use parley_types::prelude::{Address, Message};

/// Opaque login material forwarded to a messaging server untouched
pub type Credentials = serde_json::Value;

/// The wire transport to one messaging server
#[async_trait]
pub trait SignalingStub: Send + Sync {
    /// Connects as `own` to `server`. Every message received afterwards must be pushed into `inbox`
    async fn connect(
        &self,
        own: &Address,
        credentials: Option<&Credentials>,
        server: &str,
        inbox: SignalingInbox,
    ) -> Result<(), SessionError>;
    async fn send_message(&self, message: Message) -> Result<(), SessionError>;
    async fn disconnect(&self) -> Result<(), SessionError>;
}
