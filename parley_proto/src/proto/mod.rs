/// Interfaces of the external collaborators
pub mod capabilities;
/// Per-pair codec bindings and the shared codec instance cache
pub mod codec_broker;
/// The session aggregate and its participants
pub mod conversation;
/// Encodes and decodes data channel traffic of a conversation
pub mod data_channel;
/// Address resolution and the resolved-identity cache
pub mod directory;
pub(crate) mod event_processor;
/// Events flowing into the executor and out to the kernel
pub mod events;
pub mod identity;
/// Locator-to-factory maps for stubs and codecs
pub mod registry;
/// The application facade
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
