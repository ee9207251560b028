use crate::constants::{DEFAULT_ICE_SERVERS, DEFAULT_REQUEST_TIMEOUT, WEBFINGER_PROVIDER};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration of a [`Session`](crate::prelude::Session)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Accept every invitation without asking the application
    pub auto_accept: bool,
    pub directory: DirectoryProvider,
    pub ice_servers: Vec<IceServer>,
    #[serde(rename = "requestTimeoutMs", with = "millis")]
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_accept: true,
            directory: DirectoryProvider::default(),
            ice_servers: IceServer::defaults(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Where identities are looked up
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DirectoryProvider {
    #[default]
    WebFinger,
    /// A custom directory queried by appending the address to `url:port+path`
    Jsonp { url: String, port: u16, path: String },
}

impl DirectoryProvider {
    pub fn locator(&self) -> String {
        match self {
            DirectoryProvider::WebFinger => WEBFINGER_PROVIDER.to_string(),
            DirectoryProvider::Jsonp { url, port, path } => format!("{url}:{port}{path}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        urls: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: urls.into(),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn defaults() -> Vec<Self> {
        DEFAULT_ICE_SERVERS
            .iter()
            .map(|(urls, username, credential)| Self {
                urls: urls.to_string(),
                username: username.map(str::to_string),
                credential: credential.map(str::to_string),
            })
            .collect()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert!(config.auto_accept);
        assert_eq!(config.directory, DirectoryProvider::WebFinger);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.ice_servers.len(), 16);
        assert_eq!(config.ice_servers[7].urls, "stun:stun.l.google.com:19302");
        assert_eq!(
            config.ice_servers[15].username.as_deref(),
            Some("webrtc@live.com")
        );
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: SessionConfig = serde_json::from_value(json!({
            "autoAccept": false,
            "directory": { "kind": "jsonp", "url": "http://idp.example", "port": 2222, "path": "/u?jsonp=define&identity=" },
            "requestTimeoutMs": 2500
        }))
        .unwrap();

        assert!(!config.auto_accept);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.ice_servers, IceServer::defaults());
        assert_eq!(
            config.directory.locator(),
            "http://idp.example:2222/u?jsonp=define&identity="
        );
    }
}
