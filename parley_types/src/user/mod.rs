use crate::demand::DemandValue;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// A user-facing address of the form `user@domain`
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The part before the `@`, or the whole address if there is none
    pub fn user(&self) -> &str {
        self.0
            .split_once('@')
            .map(|(user, _)| user)
            .unwrap_or(self.0.as_str())
    }

    /// The part after the `@`. Addresses without a domain yield an empty string
    pub fn domain(&self) -> &str {
        self.0
            .split_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }

    pub fn same_domain(&self, other: &Address) -> bool {
        self.domain() == other.domain()
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The `to` field of a message: one address or a list of addresses
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Single(Address),
    Group(Vec<Address>),
}

impl Destination {
    pub fn addresses(&self) -> Vec<&Address> {
        match self {
            Destination::Single(address) => vec![address],
            Destination::Group(addresses) => addresses.iter().collect(),
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses().into_iter().any(|item| item == address)
    }
}

impl From<Address> for Destination {
    fn from(address: Address) -> Self {
        Destination::Single(address)
    }
}

impl From<&Address> for Destination {
    fn from(address: &Address) -> Self {
        Destination::Single(address.clone())
    }
}

impl From<Vec<Address>> for Destination {
    fn from(mut addresses: Vec<Address>) -> Self {
        if addresses.len() == 1 {
            Destination::Single(addresses.remove(0))
        } else {
            Destination::Group(addresses)
        }
    }
}

/// Selects the codec used on a data channel. Directory records advertise codecs under
/// `codec_<payload type>`
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadType(String);

impl PayloadType {
    pub const PLAIN: &'static str = "plain";
    pub const FILE: &'static str = "file";
    pub const CHAT: &'static str = "chat";
    pub const IMAGE: &'static str = "image";
    pub const VOICE: &'static str = "voice";
    pub const VIDEO: &'static str = "video";

    pub const DIRECTORY_PREFIX: &'static str = "codec_";

    pub fn new(payload_type: impl Into<String>) -> Self {
        Self(payload_type.into())
    }

    pub fn plain() -> Self {
        Self::new(Self::PLAIN)
    }

    pub fn is_plain(&self) -> bool {
        self.0 == Self::PLAIN
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Parses a directory key such as `codec_chat`
    pub fn from_directory_key(key: &str) -> Option<Self> {
        key.strip_prefix(Self::DIRECTORY_PREFIX)
            .filter(|payload_type| !payload_type.is_empty())
            .map(Self::new)
    }
}

impl Debug for PayloadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for PayloadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<&str> for PayloadType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PayloadType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<PayloadType> for DemandValue {
    fn from(payload_type: PayloadType) -> Self {
        DemandValue::PayloadType(payload_type.0)
    }
}

impl From<&PayloadType> for DemandValue {
    fn from(payload_type: &PayloadType) -> Self {
        DemandValue::PayloadType(payload_type.0.clone())
    }
}
