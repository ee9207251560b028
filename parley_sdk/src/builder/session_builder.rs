//! Session Builder API
//!
//! Collects everything a [`SessionExecutor`] needs: the [`SessionConfig`], the directory
//! resolver, the transport factory, the media source and the registries of signaling stubs and
//! codecs. Stubs and codecs are registered under the locator a directory advertises for them.
//!
//! # Important Notes
//! - A resolver, a transport factory and a media source are mandatory
//! - At least one signaling stub must be registered
//! - The plain codec is always available and does not need to be registered

use parley_proto::prelude::*;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Used to construct a [`SessionExecutor`]
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    resolver: Option<Arc<dyn DirectoryResolver>>,
    transport: Option<Arc<dyn TransportFactory>>,
    media: Option<Arc<dyn MediaSource>>,
    stubs: PluginRegistry<dyn SignalingStub>,
    codecs: PluginRegistry<dyn Codec>,
}

impl Debug for SessionBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("stubs", &self.stubs.len())
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

impl SessionBuilder {
    /// Replaces the whole configuration. Collaborators and registries are kept
    pub fn with_config(&mut self, config: SessionConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// When false, invitations wait for [`Session::answer_request`]
    pub fn with_auto_accept(&mut self, auto_accept: bool) -> &mut Self {
        self.config.auto_accept = auto_accept;
        self
    }

    pub fn with_directory_provider(&mut self, provider: DirectoryProvider) -> &mut Self {
        self.config.directory = provider;
        self
    }

    /// Replaces the default STUN/TURN list
    pub fn with_ice_servers(&mut self, ice_servers: impl IntoIterator<Item = IceServer>) -> &mut Self {
        self.config.ice_servers = ice_servers.into_iter().collect();
        self
    }

    /// Bounds every directory lookup
    pub fn with_request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_directory_resolver(&mut self, resolver: Arc<dyn DirectoryResolver>) -> &mut Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_transport_factory(&mut self, transport: Arc<dyn TransportFactory>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_media_source(&mut self, media: Arc<dyn MediaSource>) -> &mut Self {
        self.media = Some(media);
        self
    }

    /// Registers the stub implementation a directory advertises under `locator`
    pub fn with_signaling_stub<F>(&mut self, locator: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn SignalingStub> + Send + Sync + 'static,
    {
        self.stubs.register(locator, factory);
        self
    }

    /// Registers the codec implementation a directory advertises under `locator`
    pub fn with_codec<F>(&mut self, locator: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Codec> + Send + Sync + 'static,
    {
        self.codecs.register(locator, factory);
        self
    }

    /// Consumes the collaborators and registries of this builder. The configuration is kept, so the
    /// builder can be refilled and used again
    pub fn build<K: SessionKernel>(&mut self, kernel: K) -> anyhow::Result<SessionExecutor<K>> {
        log::trace!(target: "parley", "[SessionBuilder] Checking configuration ...");
        self.check()?;

        let resolver = self
            .resolver
            .take()
            .ok_or_else(|| anyhow::Error::msg("A directory resolver is required"))?;
        let transport = self
            .transport
            .take()
            .ok_or_else(|| anyhow::Error::msg("A transport factory is required"))?;
        let media = self
            .media
            .take()
            .ok_or_else(|| anyhow::Error::msg("A media source is required"))?;

        log::trace!(target: "parley", "[SessionBuilder] Creating executor ...");
        let args = SessionExecutorArguments {
            config: self.config.clone(),
            resolver,
            transport,
            media,
            stubs: std::mem::take(&mut self.stubs),
            codecs: std::mem::take(&mut self.codecs),
            kernel,
        };

        let executor =
            SessionExecutor::new(args).map_err(|err| anyhow::Error::msg(err.into_string()))?;
        log::trace!(target: "parley", "[SessionBuilder] Executor created");
        Ok(executor)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.config.ice_servers.is_empty() {
            return Err(anyhow::Error::msg("At least one ICE server must be specified"));
        }

        if self.config.request_timeout.is_zero() {
            return Err(anyhow::Error::msg("The request timeout must not be zero"));
        }

        if self.stubs.is_empty() {
            return Err(anyhow::Error::msg(
                "At least one signaling stub must be registered",
            ));
        }

        if let DirectoryProvider::Jsonp { url, .. } = &self.config.directory {
            if url.is_empty() {
                return Err(anyhow::Error::msg("A JSONP directory requires a url"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::session_builder::SessionBuilder;
    use crate::prefabs::empty::EmptyKernel;
    use crate::test_common::{
        LoopbackSignalingServer, MockMediaSource, MockTransportFactory, StaticDirectory,
    };
    use parley_proto::prelude::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;

    fn complete_builder() -> SessionBuilder {
        let server = LoopbackSignalingServer::new();
        let mut builder = SessionBuilder::default();
        let _ = builder
            .with_directory_resolver(Arc::new(StaticDirectory::default()))
            .with_transport_factory(Arc::new(MockTransportFactory::default()))
            .with_media_source(Arc::new(MockMediaSource))
            .with_signaling_stub("stub:loopback", server.stub_factory());
        builder
    }

    #[test]
    fn builds_with_every_collaborator() {
        let executor = complete_builder()
            .with_auto_accept(false)
            .with_ice_servers([IceServer::stun("stun:stun.example")])
            .build(EmptyKernel);
        let executor = executor.unwrap();
        assert!(!executor.session().config().auto_accept);
        assert_eq!(executor.session().config().ice_servers.len(), 1);
    }

    #[rstest]
    #[case::no_ice_servers(|b: &mut SessionBuilder| { let _ = b.with_ice_servers(Vec::new()); })]
    #[case::zero_timeout(|b: &mut SessionBuilder| { let _ = b.with_request_timeout(Duration::ZERO); })]
    #[case::empty_jsonp_url(|b: &mut SessionBuilder| {
        let _ = b.with_directory_provider(DirectoryProvider::Jsonp { url: String::new(), port: 80, path: "/".into() });
    })]
    fn rejects_invalid_configuration(#[case] breaker: fn(&mut SessionBuilder)) {
        let mut builder = complete_builder();
        breaker(&mut builder);
        assert!(builder.build(EmptyKernel).is_err());
    }

    #[test]
    fn requires_collaborators() {
        assert!(SessionBuilder::default().build(EmptyKernel).is_err());

        let mut builder = complete_builder();
        builder.media = None;
        assert!(builder.build(EmptyKernel).is_err());
    }
}
