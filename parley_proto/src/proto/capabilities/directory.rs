use crate::config::DirectoryProvider;
use crate::error::SessionError;
use async_trait::async_trait;
use parley_types::prelude::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The raw answer of a directory, before any connection facts are extracted from it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DirectoryRecord {
    /// WebFinger `properties`: each key is a URL, each value the role that URL plays
    WebFinger { properties: Map<String, Value> },
    /// JSONP `rows`: only the first row is consulted
    Jsonp { rows: Vec<Map<String, Value>> },
}

#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    async fn lookup(
        &self,
        address: &Address,
        provider: &DirectoryProvider,
    ) -> Result<DirectoryRecord, SessionError>;
}
