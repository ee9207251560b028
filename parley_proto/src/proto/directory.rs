//! Resolution of addresses into [`Identity`] values.
//!
//! Every address is resolved at most once per directory. The cache is append-only: entries are
//! never invalidated, and concurrent resolutions of the same address share a single lookup.

use crate::config::DirectoryProvider;
use crate::constants::{
    JSONP_SERVER_FIELD, JSONP_STUB_FIELD, ROLE_LOCAL_STUB, ROLE_MESSAGING_SERVER,
    ROLE_REMOTE_MESSAGING_SERVER, ROLE_REMOTE_STUB,
};
use crate::error::SessionError;
use crate::proto::capabilities::{Credentials, DirectoryRecord, DirectoryResolver, SignalingStub};
use crate::proto::identity::{Identity, IdentityParts};
use crate::proto::registry::PluginRegistry;
use parking_lot::{Mutex, RwLock};
use parley_types::prelude::{Address, PayloadType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

type IdentityCell = Arc<OnceCell<Arc<Identity>>>;

pub struct IdentityDirectory {
    provider: DirectoryProvider,
    resolver: Arc<dyn DirectoryResolver>,
    stubs: Arc<PluginRegistry<dyn SignalingStub>>,
    request_timeout: Duration,
    local: RwLock<Option<Address>>,
    resolved: Mutex<Vec<(Address, IdentityCell)>>,
}

impl IdentityDirectory {
    pub fn new(
        provider: DirectoryProvider,
        resolver: Arc<dyn DirectoryResolver>,
        stubs: Arc<PluginRegistry<dyn SignalingStub>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            resolver,
            stubs,
            request_timeout,
            local: RwLock::new(None),
            resolved: Mutex::new(Vec::new()),
        }
    }

    /// Sets the address remote records are compared against when choosing between the
    /// same-domain and cross-domain stub
    pub fn set_local(&self, address: Option<Address>) {
        *self.local.write() = address;
    }

    pub fn local(&self) -> Option<Address> {
        self.local.read().clone()
    }

    pub fn stubs(&self) -> &Arc<PluginRegistry<dyn SignalingStub>> {
        &self.stubs
    }

    /// Returns the cached identity for `address`, if it was already resolved
    pub fn cached(&self, address: &Address) -> Option<Arc<Identity>> {
        self.resolved
            .lock()
            .iter()
            .find(|(cached, _)| cached == address)
            .and_then(|(_, cell)| cell.get().cloned())
    }

    /// Resolves `address`. A cache hit returns the same instance without a directory round-trip.
    /// A failed lookup is not cached, so the next call tries again
    pub async fn resolve(
        &self,
        address: &Address,
        credentials: Option<Credentials>,
    ) -> Result<Arc<Identity>, SessionError> {
        if address.is_empty() {
            return Err(SessionError::InvalidArgument("address must not be empty"));
        }

        let cell = self.cell_for(address);
        cell.get_or_try_init(|| self.fetch(address, credentials))
            .await
            .cloned()
    }

    fn cell_for(&self, address: &Address) -> IdentityCell {
        let mut resolved = self.resolved.lock();
        if let Some((_, cell)) = resolved.iter().find(|(cached, _)| cached == address) {
            return cell.clone();
        }

        let cell = IdentityCell::default();
        resolved.push((address.clone(), cell.clone()));
        cell
    }

    async fn fetch(
        &self,
        address: &Address,
        credentials: Option<Credentials>,
    ) -> Result<Arc<Identity>, SessionError> {
        log::trace!(target: "parley", "Resolving {address} via {}", self.provider.locator());

        let record = tokio::time::timeout(
            self.request_timeout,
            self.resolver.lookup(address, &self.provider),
        )
        .await
        .map_err(|_| SessionError::ResolutionError {
            address: address.to_string(),
            reason: format!("directory did not answer within {:?}", self.request_timeout),
        })?
        .map_err(|err| SessionError::ResolutionError {
            address: address.to_string(),
            reason: err.into_string(),
        })?;

        let local = self.local();
        let facts = ConnectionFacts::parse(&record, local.as_ref(), address)?;
        let stub = self
            .stubs
            .instantiate(&facts.stub_locator)
            .ok_or_else(|| SessionError::StubLoadError(facts.stub_locator.clone()))?;

        log::trace!(target: "parley", "Resolved {address}: stub={} server={} codecs={:?}", facts.stub_locator, facts.signaling_server, facts.codecs);

        Ok(Arc::new(Identity::new(IdentityParts {
            address: address.clone(),
            directory_provider: self.provider.clone(),
            stub,
            stub_locator: facts.stub_locator,
            signaling_server: facts.signaling_server,
            codecs: facts.codecs,
            credentials,
            stub_registry: self.stubs.clone(),
        })))
    }
}

/// What a directory record says about how to reach an identity
#[derive(Debug, Eq, PartialEq)]
struct ConnectionFacts {
    stub_locator: String,
    signaling_server: String,
    codecs: HashMap<PayloadType, String>,
}

impl ConnectionFacts {
    fn parse(
        record: &DirectoryRecord,
        local: Option<&Address>,
        target: &Address,
    ) -> Result<Self, SessionError> {
        let malformed = |reason: &str| SessionError::ResolutionError {
            address: target.to_string(),
            reason: reason.to_string(),
        };

        match record {
            DirectoryRecord::WebFinger { properties } => {
                let mut local_stub = None;
                let mut remote_stub = None;
                let mut server = None;
                let mut remote_server = None;
                let mut codecs = HashMap::new();

                for (url, role) in properties {
                    let Some(role) = role.as_str() else {
                        continue;
                    };

                    match role {
                        ROLE_LOCAL_STUB => local_stub = Some(url.clone()),
                        ROLE_REMOTE_STUB => remote_stub = Some(url.clone()),
                        ROLE_MESSAGING_SERVER => server = Some(url.clone()),
                        ROLE_REMOTE_MESSAGING_SERVER => remote_server = Some(url.clone()),
                        role => {
                            if let Some(payload_type) = PayloadType::from_directory_key(role) {
                                let _ = codecs.insert(payload_type, url.clone());
                            }
                        }
                    }
                }

                let cross_domain = local.map(|local| !local.same_domain(target)).unwrap_or(false);
                let (stub_locator, signaling_server) = match (remote_stub, remote_server) {
                    (Some(stub), Some(server)) if cross_domain => (Some(stub), Some(server)),
                    _ => (local_stub, server),
                };

                Ok(Self {
                    stub_locator: stub_locator.ok_or_else(|| malformed("no stub advertised"))?,
                    signaling_server: signaling_server
                        .ok_or_else(|| malformed("no messaging server advertised"))?,
                    codecs,
                })
            }

            DirectoryRecord::Jsonp { rows } => {
                let row = rows.first().ok_or_else(|| malformed("empty record"))?;
                let field = |name: &str| row.get(name).and_then(Value::as_str).map(str::to_string);

                let codecs = row
                    .iter()
                    .filter_map(|(key, locator)| {
                        Some((
                            PayloadType::from_directory_key(key)?,
                            locator.as_str()?.to_string(),
                        ))
                    })
                    .collect();

                Ok(Self {
                    stub_locator: field(JSONP_STUB_FIELD)
                        .ok_or_else(|| malformed("no stub advertised"))?,
                    signaling_server: field(JSONP_SERVER_FIELD)
                        .ok_or_else(|| malformed("no messaging server advertised"))?,
                    codecs,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::testing::{webfinger_record, NullStub};
    use async_trait::async_trait;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        lookups: AtomicUsize,
        record: Option<DirectoryRecord>,
        delay: Duration,
    }

    impl CountingResolver {
        fn new(record: Option<DirectoryRecord>) -> Arc<Self> {
            Arc::new(Self {
                lookups: AtomicUsize::new(0),
                record,
                delay: Duration::from_millis(10),
            })
        }
    }

    #[async_trait]
    impl DirectoryResolver for CountingResolver {
        async fn lookup(
            &self,
            _address: &Address,
            _provider: &DirectoryProvider,
        ) -> Result<DirectoryRecord, SessionError> {
            let _ = self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.record
                .clone()
                .ok_or_else(|| SessionError::transport("directory unreachable"))
        }
    }

    fn stubs() -> Arc<PluginRegistry<dyn SignalingStub>> {
        let stubs = PluginRegistry::<dyn SignalingStub>::new();
        stubs.register("stub:local", || Arc::new(NullStub) as Arc<dyn SignalingStub>);
        stubs.register("stub:remote", || Arc::new(NullStub) as Arc<dyn SignalingStub>);
        Arc::new(stubs)
    }

    fn directory(resolver: Arc<CountingResolver>, timeout: Duration) -> IdentityDirectory {
        IdentityDirectory::new(DirectoryProvider::WebFinger, resolver, stubs(), timeout)
    }

    fn cross_domain_record() -> DirectoryRecord {
        DirectoryRecord::WebFinger {
            properties: json!({
                "stub:local": "localStub",
                "stub:remote": "remoteStub",
                "wss://b.example": "messagingServer",
                "wss://gateway.b.example": "messagingServer_remote",
                "https://b.example/codecs/chat": "codec_chat"
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_the_directory() {
        let resolver = CountingResolver::new(Some(webfinger_record("stub:local", "wss://a")));
        let directory = directory(resolver.clone(), Duration::from_secs(1));
        let bob = Address::from("bob@a.example");

        let first = directory.resolve(&bob, None).await.unwrap();
        let second = directory.resolve(&bob, None).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
        assert!(directory.cached(&bob).is_some());
    }

    #[tokio::test]
    async fn concurrent_resolutions_collapse_into_one_lookup() {
        let resolver = CountingResolver::new(Some(webfinger_record("stub:local", "wss://a")));
        let directory = directory(resolver.clone(), Duration::from_secs(1));
        let bob = Address::from("bob@a.example");

        let (first, second) = tokio::join!(directory.resolve(&bob, None), directory.resolve(&bob, None));

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case("alice@a.example", "stub:remote", "wss://gateway.b.example")]
    #[case("carol@b.example", "stub:local", "wss://b.example")]
    #[tokio::test]
    async fn remote_stub_is_used_across_domains(
        #[case] local: &str,
        #[case] stub: &str,
        #[case] server: &str,
    ) {
        let resolver = CountingResolver::new(Some(cross_domain_record()));
        let directory = directory(resolver, Duration::from_secs(1));
        directory.set_local(Some(Address::from(local)));

        let bob = directory
            .resolve(&Address::from("bob@b.example"), None)
            .await
            .unwrap();

        assert_eq!(bob.stub_locator(), stub);
        assert_eq!(bob.signaling_server(), server);
        assert_eq!(
            bob.codec_locator(&PayloadType::from(PayloadType::CHAT)),
            Some("https://b.example/codecs/chat")
        );
    }

    #[test]
    fn jsonp_rows_are_parsed() {
        let record = DirectoryRecord::Jsonp {
            rows: vec![json!({
                "messagingStubURL": "stub:local",
                "messagingServer": "wss://a",
                "codec_file": "https://a.example/codecs/file",
                "displayName": "Bob"
            })
            .as_object()
            .cloned()
            .unwrap_or_default()],
        };

        let facts = ConnectionFacts::parse(&record, None, &Address::from("bob@a.example")).unwrap();
        assert_eq!(facts.stub_locator, "stub:local");
        assert_eq!(facts.signaling_server, "wss://a");
        assert_eq!(facts.codecs.len(), 1);
        assert_eq!(
            facts.codecs.get(&PayloadType::from(PayloadType::FILE)).map(String::as_str),
            Some("https://a.example/codecs/file")
        );
    }

    #[tokio::test]
    async fn failures_are_reported_and_not_cached() {
        let bob = Address::from("bob@a.example");

        let unreachable = CountingResolver::new(None);
        let directory = directory(unreachable.clone(), Duration::from_secs(1));
        assert!(matches!(
            directory.resolve(&bob, None).await,
            Err(SessionError::ResolutionError { address, reason })
                if address == "bob@a.example" && reason.contains("directory unreachable")
        ));
        assert!(directory.resolve(&bob, None).await.is_err());
        assert_eq!(unreachable.lookups.load(Ordering::SeqCst), 2);

        let slow = CountingResolver::new(Some(webfinger_record("stub:local", "wss://a")));
        let directory = self::directory(slow, Duration::from_millis(1));
        assert!(matches!(
            directory.resolve(&bob, None).await,
            Err(SessionError::ResolutionError { .. })
        ));

        let unknown_stub = CountingResolver::new(Some(webfinger_record("stub:missing", "wss://a")));
        let directory = self::directory(unknown_stub, Duration::from_secs(1));
        assert!(matches!(
            directory.resolve(&bob, None).await,
            Err(SessionError::StubLoadError(locator)) if locator == "stub:missing"
        ));

        assert!(matches!(
            directory.resolve(&Address::from(""), None).await,
            Err(SessionError::InvalidArgument(_))
        ));
    }
}
