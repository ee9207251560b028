use crate::config::SessionConfig;
use crate::proto::capabilities::{
    Codec, DirectoryResolver, MediaSource, SignalingStub, TransportFactory,
};
use crate::proto::registry::PluginRegistry;
use std::sync::Arc;

/// Runs a [`kernel_trait::SessionKernel`] against a session
pub mod kernel_executor;
/// The interface between the protocol core and the application
pub mod kernel_trait;

/// Everything needed to construct a [`kernel_executor::SessionExecutor`]
pub struct SessionExecutorArguments<K> {
    pub config: SessionConfig,
    pub resolver: Arc<dyn DirectoryResolver>,
    pub transport: Arc<dyn TransportFactory>,
    pub media: Arc<dyn MediaSource>,
    pub stubs: PluginRegistry<dyn SignalingStub>,
    pub codecs: PluginRegistry<dyn Codec>,
    pub kernel: K,
}
