//! Interfaces of the external collaborators the protocol core drives but never implements:
//! signaling stubs, the real-time transport, local media capture, the identity directory and
//! payload codecs.

mod codec;
mod directory;
mod media;
mod signaling;
mod transport;

pub use codec::{Codec, PlainCodec};
pub use directory::{DirectoryRecord, DirectoryResolver};
pub use media::MediaSource;
pub use signaling::{Credentials, SignalingStub};
pub use transport::{DataChannel, PeerConnection, TransportFactory};
