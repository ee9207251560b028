use crate::config::DirectoryProvider;
use crate::error::SessionError;
use crate::proto::capabilities::{Credentials, SignalingStub};
use crate::proto::registry::PluginRegistry;
use parking_lot::RwLock;
use parley_types::prelude::{Address, PayloadType};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A resolved user. Created once per address by the
/// [`IdentityDirectory`](crate::proto::directory::IdentityDirectory) and immutable afterwards,
/// except for the credentials attached at login
pub struct Identity {
    address: Address,
    directory_provider: DirectoryProvider,
    stub: Arc<dyn SignalingStub>,
    stub_locator: String,
    signaling_server: String,
    codecs: HashMap<PayloadType, String>,
    credentials: RwLock<Option<Credentials>>,
    stub_registry: Arc<PluginRegistry<dyn SignalingStub>>,
}

pub(crate) struct IdentityParts {
    pub address: Address,
    pub directory_provider: DirectoryProvider,
    pub stub: Arc<dyn SignalingStub>,
    pub stub_locator: String,
    pub signaling_server: String,
    pub codecs: HashMap<PayloadType, String>,
    pub credentials: Option<Credentials>,
    pub stub_registry: Arc<PluginRegistry<dyn SignalingStub>>,
}

impl Identity {
    pub(crate) fn new(parts: IdentityParts) -> Self {
        let IdentityParts {
            address,
            directory_provider,
            stub,
            stub_locator,
            signaling_server,
            codecs,
            credentials,
            stub_registry,
        } = parts;

        Self {
            address,
            directory_provider,
            stub,
            stub_locator,
            signaling_server,
            codecs,
            credentials: RwLock::new(credentials),
            stub_registry,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn directory_provider(&self) -> &DirectoryProvider {
        &self.directory_provider
    }

    /// The stub instantiated when this identity was resolved
    pub fn stub(&self) -> &Arc<dyn SignalingStub> {
        &self.stub
    }

    pub fn stub_locator(&self) -> &str {
        &self.stub_locator
    }

    pub fn signaling_server(&self) -> &str {
        &self.signaling_server
    }

    /// Payload type to codec locator. Empty means only the plain codec is supported
    pub fn codecs(&self) -> &HashMap<PayloadType, String> {
        &self.codecs
    }

    pub fn codec_locator(&self, payload_type: &PayloadType) -> Option<&str> {
        self.codecs.get(payload_type).map(String::as_str)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.write() = credentials;
    }

    /// Whether both identities are served by the same messaging server
    pub fn shares_server_with(&self, other: &Identity) -> bool {
        self.signaling_server == other.signaling_server
    }

    /// A new, unconnected stub of the same implementation as [`Self::stub`]
    pub fn fresh_stub(&self) -> Result<Arc<dyn SignalingStub>, SessionError> {
        self.stub_registry
            .instantiate(&self.stub_locator)
            .ok_or_else(|| SessionError::StubLoadError(self.stub_locator.clone()))
    }
}

impl Debug for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("stub_locator", &self.stub_locator)
            .field("signaling_server", &self.signaling_server)
            .field("codecs", &self.codecs)
            .finish()
    }
}
