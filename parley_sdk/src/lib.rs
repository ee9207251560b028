//! # Parley SDK
//!
//! The high-level entry point of the parley framework. A [`SessionBuilder`](crate::prelude::SessionBuilder)
//! collects the configuration and the external collaborators of a session (directory resolver,
//! transport factory, media source, signaling stubs and codecs) and produces a
//! [`SessionExecutor`](crate::prelude::SessionExecutor) that runs a kernel against it.
//!
//! ```rust,no_run
//! use parley_sdk::prelude::*;
//! use parley_sdk::prefabs::empty::EmptyKernel;
//! # use std::sync::Arc;
//! # async fn run(
//! #     resolver: Arc<dyn DirectoryResolver>,
//! #     transport: Arc<dyn TransportFactory>,
//! #     media: Arc<dyn MediaSource>,
//! #     stub: fn() -> Arc<dyn SignalingStub>,
//! # ) -> anyhow::Result<()> {
//! let executor = SessionBuilder::default()
//!     .with_auto_accept(false)
//!     .with_directory_resolver(resolver)
//!     .with_transport_factory(transport)
//!     .with_media_source(media)
//!     .with_signaling_stub("https://a.example/stub.js", stub)
//!     .build(EmptyKernel)?;
//!
//! let session = executor.session();
//! let runner = tokio::spawn(executor.execute());
//! let _ = session.login("alice@a.example", None).await?;
//! # drop(runner);
//! # Ok(())
//! # }
//! ```
#![doc(html_no_source)]
#![forbid(unsafe_code)]
#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_features,
    unused_results
)]
#![allow(rustdoc::broken_intra_doc_links)]

pub mod prelude {
    pub use crate::builder::session_builder::SessionBuilder;
    pub use crate::prefabs::channel::{ChannelKernel, KernelEvent};
    pub use crate::prefabs::empty::EmptyKernel;
    pub use parley_proto::prelude::*;
    pub use parley_proto::re_imports::{async_trait, json, Bytes, Uuid, Value};
}

/// Convenience for constructing sessions
pub mod builder;
/// Ready-made kernels
pub mod prefabs;

#[doc(hidden)]
pub mod test_common;
