use crate::config::DirectoryProvider;
use crate::error::SessionError;
use crate::proto::capabilities::{Credentials, DirectoryRecord, SignalingStub};
use crate::proto::events::SignalingInbox;
use crate::proto::identity::{Identity, IdentityParts};
use crate::proto::registry::PluginRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use parley_types::prelude::{Address, Message, PayloadType};
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::Arc;

/// Accepts everything and drops it
#[derive(Default)]
pub struct NullStub;

#[async_trait]
impl SignalingStub for NullStub {
    async fn connect(
        &self,
        _own: &Address,
        _credentials: Option<&Credentials>,
        _server: &str,
        _inbox: SignalingInbox,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_message(&self, _message: Message) -> Result<(), SessionError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Remembers what was sent
#[derive(Default)]
pub struct RecordingStub {
    pub sent: Mutex<Vec<Message>>,
    pub disconnects: Mutex<usize>,
}

#[async_trait]
impl SignalingStub for RecordingStub {
    async fn connect(
        &self,
        _own: &Address,
        _credentials: Option<&Credentials>,
        _server: &str,
        _inbox: SignalingInbox,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_message(&self, message: Message) -> Result<(), SessionError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        *self.disconnects.lock() += 1;
        Ok(())
    }
}

pub fn webfinger_record(stub: &str, server: &str) -> DirectoryRecord {
    let mut properties = Map::new();
    let _ = properties.insert(stub.to_string(), json!("localStub"));
    let _ = properties.insert(server.to_string(), json!("messagingServer"));
    DirectoryRecord::WebFinger { properties }
}

pub fn identity(address: &str, codecs: &[(&str, &str)], stub: Arc<dyn SignalingStub>) -> Arc<Identity> {
    Arc::new(Identity::new(IdentityParts {
        address: Address::from(address),
        directory_provider: DirectoryProvider::WebFinger,
        stub,
        stub_locator: "stub:null".to_string(),
        signaling_server: "wss://a".to_string(),
        codecs: codecs
            .iter()
            .map(|(payload_type, locator)| (PayloadType::from(*payload_type), locator.to_string()))
            .collect::<HashMap<_, _>>(),
        credentials: None,
        stub_registry: Arc::new(PluginRegistry::new()),
    }))
}
