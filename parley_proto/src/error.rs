use std::error::Error;
use std::fmt::Formatter;
use std::fmt::{Debug, Display};
use tokio::sync::mpsc::error::SendError;
use uuid::Uuid;

pub enum SessionError {
    /// A required parameter was missing or malformed (no address, no demand, no recipients)
    InvalidArgument(&'static str),
    /// The directory could not be reached in time or returned a record that could not be parsed
    ResolutionError { address: String, reason: String },
    /// No signaling stub implementation is registered under the locator
    StubLoadError(String),
    /// No codec implementation is registered under the locator
    CodecLoadError(String),
    /// A data channel was requested with an explicit `false` payload type
    PayloadRejected { to: String },
    /// A message reached a handler bound to a different conversation
    ProtocolViolation { expected: Uuid, received: Uuid },
    /// The operation needs a logged-in identity or an existing conversation
    NoActiveSession(&'static str),
    /// Thrown by the real-time transport, a signaling stub or a data channel
    Transport(String),
    Timeout(String),
    /// For a converted error
    Generic(String),
}

impl Error for SessionError {}

impl Debug for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_msg())
    }
}

impl SessionError {
    fn to_msg(&self) -> String {
        match self {
            SessionError::InvalidArgument(err) => format!("Invalid argument: {err}"),
            SessionError::ResolutionError { address, reason } => {
                format!("Unable to resolve {address}: {reason}")
            }
            SessionError::StubLoadError(locator) => {
                format!("No signaling stub available at {locator}")
            }
            SessionError::CodecLoadError(locator) => {
                format!("No codec available at {locator}")
            }
            SessionError::PayloadRejected { to } => {
                format!("Data channel to {to} was requested with payload type false")
            }
            SessionError::ProtocolViolation { expected, received } => {
                format!("Message for conversation {received} reached the handler of {expected}")
            }
            SessionError::NoActiveSession(err) => (*err).to_string(),
            SessionError::Transport(err) => err.clone(),
            SessionError::Timeout(err) => format!("Timeout: {err}"),
            SessionError::Generic(err) => err.clone(),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            SessionError::Transport(err) | SessionError::Generic(err) => err,
            err => err.to_msg(),
        }
    }

    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Generic(msg.into())
    }

    pub fn transport<T: Display>(err: T) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        <Self as Debug>::fmt(self, f)
    }
}

impl<T> From<SendError<T>> for SessionError {
    fn from(err: SendError<T>) -> Self {
        SessionError::Generic(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Generic(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SessionError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        SessionError::Timeout(err.to_string())
    }
}

impl From<parley_types::errors::Error> for SessionError {
    fn from(err: parley_types::errors::Error) -> Self {
        SessionError::Generic(err.to_string())
    }
}
