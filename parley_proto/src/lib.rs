//! # Parley Protocol
//!
//! The session-establishment engine of the parley framework. Given a user-facing address, a
//! [`Session`](crate::prelude::Session) resolves the connection facts of that user through an
//! identity directory, drives the signaling exchange (invitation, accept or decline, candidate
//! exchange, teardown) over a pluggable signaling stub, and binds application payload formats
//! to data channels through a codec broker.
//!
//! Everything outside the protocol core is consumed through the traits in
//! [`proto::capabilities`]: the real-time transport, local media capture, the directory lookup,
//! the wire transport to a messaging server and payload codecs.
//!
//! Applications implement a [`SessionKernel`](crate::prelude::SessionKernel) and run it with a
//! [`SessionExecutor`](crate::prelude::SessionExecutor). The executor drains every inbound event
//! on a single logical thread and hands the results to the kernel.
#![doc(html_no_source)]
#![forbid(unsafe_code)]
#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_features
)]
#![allow(rustdoc::broken_intra_doc_links)]

pub mod re_imports {
    pub use async_trait::async_trait;
    pub use bytes::Bytes;
    pub use serde_json::{json, Value};
    pub use uuid::Uuid;
}

pub mod prelude {
    pub use parley_types::prelude::*;

    pub use crate::config::{DirectoryProvider, IceServer, SessionConfig};
    pub use crate::constants::*;
    pub use crate::error::SessionError;
    pub use crate::kernel::kernel_executor::SessionExecutor;
    pub use crate::kernel::kernel_trait::SessionKernel;
    pub use crate::kernel::SessionExecutorArguments;
    pub use crate::proto::capabilities::*;
    pub use crate::proto::codec_broker::{CodecBroker, CodecCache};
    pub use crate::proto::conversation::{
        Conversation, ConversationState, Participant, SignalingLink,
    };
    pub use crate::proto::directory::IdentityDirectory;
    pub use crate::proto::events::{
        DataChannelEvent, InboundEvent, SignalingInbox, TransportEvent, TransportEventSender,
    };
    pub use crate::proto::identity::Identity;
    pub use crate::proto::registry::PluginRegistry;
    pub use crate::proto::session::{ConversationHandle, Session};
}

pub mod config;
pub mod constants;
mod error;
pub mod kernel;
pub mod proto;
