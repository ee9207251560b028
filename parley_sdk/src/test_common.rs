//! In-process doubles of every external collaborator: a loopback messaging server with its stub,
//! a static directory, a scripted transport and a fake media source. Used by the integration
//! tests to run several sessions against each other without a network.
#![allow(dead_code)]

use crate::prelude::*;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

pub const LOOPBACK_STUB_LOCATOR: &str = "loopback:stub";
pub const CHAT_CODEC_LOCATOR: &str = "loopback:codec/chat";
/// Applied to every wait on a kernel event
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

type Routes = Arc<Mutex<HashMap<(String, Address), SignalingInbox>>>;

/// Routes messages between the stubs connected to it, keyed by `(server, address)`. One value
/// simulates any number of messaging servers
#[derive(Clone, Default)]
pub struct LoopbackSignalingServer {
    routes: Routes,
    routed: Arc<Mutex<Vec<(String, Message)>>>,
}

impl LoopbackSignalingServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub_factory(&self) -> impl Fn() -> Arc<dyn SignalingStub> + Send + Sync + 'static {
        let server = self.clone();
        move || Arc::new(LoopbackStub::new(server.clone())) as Arc<dyn SignalingStub>
    }

    pub fn is_connected(&self, server: &str, address: &str) -> bool {
        self.routes
            .lock()
            .contains_key(&(server.to_string(), Address::from(address)))
    }

    /// Every message accepted so far, with the server it went through
    pub fn routed(&self) -> Vec<(String, Message)> {
        self.routed.lock().clone()
    }

    /// Delivers `message` to `to` on `server` as if it came off the wire
    pub fn inject(&self, server: &str, to: &str, message: Message) -> Result<(), SessionError> {
        let inbox = self
            .routes
            .lock()
            .get(&(server.to_string(), Address::from(to)))
            .cloned()
            .ok_or_else(|| SessionError::transport(format!("{to} is not connected to {server}")))?;
        inbox.deliver(message)
    }

    fn route(&self, server: &str, message: Message) -> Result<(), SessionError> {
        self.routed.lock().push((server.to_string(), message.clone()));
        let inboxes = message
            .to
            .addresses()
            .into_iter()
            .filter_map(|address| {
                let inbox = self
                    .routes
                    .lock()
                    .get(&(server.to_string(), address.clone()))
                    .cloned();
                if inbox.is_none() {
                    log::warn!(target: "parley", "[Loopback] {address} is not connected to {server}");
                }
                inbox
            })
            .collect::<Vec<_>>();

        for inbox in inboxes {
            inbox.deliver(message.clone())?;
        }

        Ok(())
    }
}

/// One connection to a [`LoopbackSignalingServer`]
pub struct LoopbackStub {
    server: LoopbackSignalingServer,
    endpoint: Mutex<Option<(String, Address)>>,
}

impl LoopbackStub {
    pub fn new(server: LoopbackSignalingServer) -> Self {
        Self {
            server,
            endpoint: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SignalingStub for LoopbackStub {
    async fn connect(
        &self,
        own: &Address,
        _credentials: Option<&Credentials>,
        server: &str,
        inbox: SignalingInbox,
    ) -> Result<(), SessionError> {
        let key = (server.to_string(), own.clone());
        let _ = self.server.routes.lock().insert(key.clone(), inbox);
        *self.endpoint.lock() = Some(key);
        Ok(())
    }

    async fn send_message(&self, message: Message) -> Result<(), SessionError> {
        let server = self
            .endpoint
            .lock()
            .as_ref()
            .map(|(server, _)| server.clone())
            .ok_or_else(|| SessionError::transport("stub is not connected"))?;
        self.server.route(&server, message)
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        if let Some(key) = self.endpoint.lock().take() {
            let _ = self.server.routes.lock().remove(&key);
        }

        Ok(())
    }
}

/// Answers every lookup from a fixed table of WebFinger records
#[derive(Default)]
pub struct StaticDirectory {
    records: Mutex<HashMap<Address, DirectoryRecord>>,
}

impl StaticDirectory {
    /// Publishes `address` as reachable through the loopback stub on `server`, advertising
    /// `codecs` as `(payload type, locator)` pairs
    pub fn publish(&self, address: &str, server: &str, codecs: &[(&str, &str)]) {
        let mut properties = Map::new();
        let _ = properties.insert(LOOPBACK_STUB_LOCATOR.to_string(), json!(ROLE_LOCAL_STUB));
        let _ = properties.insert(server.to_string(), json!(ROLE_MESSAGING_SERVER));
        for (payload_type, locator) in codecs {
            let role = format!("{}{payload_type}", PayloadType::DIRECTORY_PREFIX);
            let _ = properties.insert(locator.to_string(), json!(role));
        }

        let _ = self
            .records
            .lock()
            .insert(Address::from(address), DirectoryRecord::WebFinger { properties });
    }
}

#[async_trait]
impl DirectoryResolver for StaticDirectory {
    async fn lookup(
        &self,
        address: &Address,
        _provider: &DirectoryProvider,
    ) -> Result<DirectoryRecord, SessionError> {
        self.records
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| SessionError::ResolutionError {
                address: address.to_string(),
                reason: "unknown user".to_string(),
            })
    }
}

/// Wraps payloads in a `{"chat": ...}` envelope so tests can tell it apart from the plain codec
#[derive(Default, Debug, Copy, Clone)]
pub struct ChatCodec;

impl Codec for ChatCodec {
    fn encode(&self, payload: &Value) -> Result<Bytes, SessionError> {
        Ok(Bytes::from(serde_json::to_vec(&json!({ "chat": payload }))?))
    }

    fn decode(&self, frame: &[u8]) -> Result<Value, SessionError> {
        let mut envelope: Value = serde_json::from_slice(frame)?;
        envelope
            .get_mut("chat")
            .map(Value::take)
            .ok_or_else(|| SessionError::msg("frame is not a chat envelope"))
    }
}

/// Creates a [`MockPeerConnection`] per conversation and keeps a handle to each
pub struct MockTransportFactory {
    candidates: usize,
    connections: Mutex<Vec<Arc<MockPeerConnection>>>,
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MockTransportFactory {
    /// Every connection gathers `candidates` local candidates each time its local description is
    /// set. Each round is tagged with its generation, starting at 0
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn connection_for(&self, conversation_id: Uuid) -> Option<Arc<MockPeerConnection>> {
        self.connections
            .lock()
            .iter()
            .find(|connection| connection.conversation_id == conversation_id)
            .cloned()
    }

    pub fn connections(&self) -> Vec<Arc<MockPeerConnection>> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServer],
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerConnection>, SessionError> {
        let connection = Arc::new(MockPeerConnection::new(events, self.candidates));
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

/// Records every call and raises the callbacks a real connection would
pub struct MockPeerConnection {
    conversation_id: Uuid,
    events: TransportEventSender,
    candidates: usize,
    generation: AtomicUsize,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    added_candidates: Mutex<Vec<IceCandidate>>,
    tracks: Mutex<Vec<MediaTrack>>,
    channels: Mutex<Vec<Arc<MockDataChannel>>>,
    closed: AtomicBool,
}

impl MockPeerConnection {
    fn new(events: TransportEventSender, candidates: usize) -> Self {
        Self {
            conversation_id: events.conversation_id(),
            events,
            candidates,
            generation: AtomicUsize::new(0),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            added_candidates: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn added_candidates(&self) -> Vec<String> {
        self.added_candidates
            .lock()
            .iter()
            .map(|candidate| candidate.candidate.clone())
            .collect()
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.lock().clone()
    }

    pub fn channels(&self) -> Vec<Arc<MockDataChannel>> {
        self.channels.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Simulates a frame arriving from the remote end of the channel labelled `label`
    pub fn receive_frame(&self, label: &str, payload: Bytes) -> Result<(), SessionError> {
        self.events.send(TransportEvent::DataChannelMessage {
            label: label.to_string(),
            payload,
        })
    }

    /// Simulates the remote peer opening a channel
    pub fn open_remote_channel(&self, label: &str) -> Result<Arc<MockDataChannel>, SessionError> {
        let channel = Arc::new(MockDataChannel::new(label, self.events.clone()));
        self.events
            .send(TransportEvent::DataChannelOpened(channel.clone()))?;
        Ok(channel)
    }

    fn description(&self, sdp_type: SdpType) -> SessionDescription {
        SessionDescription {
            sdp_type,
            sdp: format!("v=0 {sdp_type} {}", self.conversation_id),
        }
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        Ok(self.description(SdpType::Offer))
    }

    async fn create_answer(&self) -> Result<SessionDescription, SessionError> {
        if self.remote.lock().is_none() {
            return Err(SessionError::transport("no remote offer to answer"));
        }

        Ok(self.description(SdpType::Answer))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError> {
        let _ = self.local.lock().replace(description);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        for idx in 0..self.candidates {
            let candidate = IceCandidate::new(
                format!("candidate:{idx} generation {generation}"),
                Some("0".to_string()),
                Some(0),
            );
            self.events
                .send(TransportEvent::IceCandidate(Some(candidate)))?;
        }

        self.events.send(TransportEvent::IceCandidate(None))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError> {
        *self.remote.lock() = Some(description);
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        self.added_candidates.lock().push(candidate);
        Ok(())
    }

    async fn add_track(&self, track: MediaTrack, _stream: &MediaStream) -> Result<(), SessionError> {
        self.tracks.lock().push(track);
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, SessionError> {
        let channel = Arc::new(MockDataChannel::new(label, self.events.clone()));
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Keeps every frame it was asked to send
#[derive(Debug)]
pub struct MockDataChannel {
    label: String,
    events: TransportEventSender,
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl MockDataChannel {
    fn new(label: &str, events: TransportEventSender) -> Self {
        Self {
            label: label.to_string(),
            events,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send(&self, payload: Bytes) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::transport("data channel is closed"));
        }

        self.sent.lock().push(payload);
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        if !self.closed.swap(true, Ordering::Relaxed) {
            self.events.send(TransportEvent::DataChannelClosed {
                label: self.label.clone(),
            })?;
        }

        Ok(())
    }
}

/// Produces one track per requested media kind
#[derive(Default, Debug, Copy, Clone)]
pub struct MockMediaSource;

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn acquire(&self, demand: &DirectionalDemand) -> Result<MediaStream, SessionError> {
        let mut tracks = Vec::new();
        if demand.audio.is_requested() {
            tracks.push(MediaTrack::new(MediaKind::Audio));
        }

        if demand.video.is_requested() {
            tracks.push(MediaTrack::new(MediaKind::Video));
        }

        Ok(MediaStream::new(tracks))
    }
}

/// A loopback server and a directory shared by every peer spawned from it
#[derive(Clone, Default)]
pub struct TestNetwork {
    pub server: LoopbackSignalingServer,
    pub directory: Arc<StaticDirectory>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each domain gets its own messaging server
    pub fn server_of(address: &str) -> String {
        format!("wss://{}", Address::from(address).domain())
    }

    /// Publishes `address` advertising the chat codec and spawns an executor for it. The peer is
    /// not logged in yet
    pub fn spawn_peer(&self, address: &str, auto_accept: bool) -> anyhow::Result<TestPeer> {
        self.spawn_peer_with_codecs(address, auto_accept, &[(PayloadType::CHAT, CHAT_CODEC_LOCATOR)])
    }

    pub fn spawn_peer_with_codecs(
        &self,
        address: &str,
        auto_accept: bool,
        codecs: &[(&str, &str)],
    ) -> anyhow::Result<TestPeer> {
        self.directory
            .publish(address, &Self::server_of(address), codecs);

        let transport = Arc::new(MockTransportFactory::default());
        let (kernel, events) = ChannelKernel::new();
        let executor = SessionBuilder::default()
            .with_auto_accept(auto_accept)
            .with_ice_servers([IceServer::stun("stun:stun.loopback")])
            .with_request_timeout(Duration::from_secs(1))
            .with_directory_resolver(self.directory.clone())
            .with_transport_factory(transport.clone())
            .with_media_source(Arc::new(MockMediaSource))
            .with_signaling_stub(LOOPBACK_STUB_LOCATOR, self.server.stub_factory())
            .with_codec(CHAT_CODEC_LOCATOR, || Arc::new(ChatCodec) as Arc<dyn Codec>)
            .build(kernel)?;

        let session = executor.session();
        let runner = tokio::task::spawn(executor.execute());

        Ok(TestPeer {
            address: Address::from(address),
            session,
            events,
            transport,
            runner,
        })
    }
}

pub struct TestPeer {
    pub address: Address,
    pub session: Session,
    pub events: UnboundedReceiver<KernelEvent>,
    pub transport: Arc<MockTransportFactory>,
    pub runner: JoinHandle<Result<ChannelKernel, SessionError>>,
}

impl TestPeer {
    pub async fn login(&self) -> Result<Arc<Identity>, SessionError> {
        self.session.login(self.address.clone(), None).await
    }

    /// Panics if nothing arrives within [`EVENT_TIMEOUT`]
    pub async fn next_event(&mut self) -> KernelEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for a kernel event")
            .expect("kernel channel closed")
    }

    /// Skips events until `filter` picks one
    pub async fn wait_for<T>(&mut self, mut filter: impl FnMut(KernelEvent) -> Option<T>) -> T {
        loop {
            if let Some(found) = filter(self.next_event().await) {
                return found;
            }
        }
    }

    /// Waits for a signaling message of the given type
    pub async fn wait_for_message(&mut self, message_type: MessageType) -> Message {
        self.wait_for(|event| match event {
            KernelEvent::Message(message) if message.message_type() == Some(message_type) => {
                Some(message)
            }
            _ => None,
        })
        .await
    }

    pub fn connection(&self, conversation_id: Uuid) -> Arc<MockPeerConnection> {
        self.transport
            .connection_for(conversation_id)
            .expect("no connection was created for this conversation")
    }

    pub async fn conversation_state(&self, conversation_id: Uuid) -> Option<ConversationState> {
        let handle = self.session.conversation(conversation_id)?;
        let state = handle.lock().await.state();
        Some(state)
    }

    /// Shuts the executor down and waits for it
    pub async fn stop(self) -> ChannelKernel {
        self.session.shutdown().expect("executor already stopped");
        self.runner
            .await
            .expect("executor panicked")
            .expect("executor failed")
    }
}
