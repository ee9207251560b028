use std::fmt::{Display, Formatter};

/// The default error type for this crate
#[derive(Debug)]
pub enum Error {
    /// A message type that requires a `misc` payload arrived without one
    MissingPayload(&'static str),
    /// The `misc` payload did not match the shape required by the message type
    MalformedPayload { kind: &'static str, reason: String },
    /// A candidate payload was a string other than the `"last"` marker
    UnknownCandidateMarker(String),
    /// For message types requiring heap
    Other(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingPayload(kind) => write!(f, "{kind} message carries no payload"),
            Error::MalformedPayload { kind, reason } => {
                write!(f, "malformed {kind} payload: {reason}")
            }
            Error::UnknownCandidateMarker(marker) => {
                write!(f, "unknown candidate marker {marker:?}")
            }
            Error::Other(err) => f.write_str(err),
        }
    }
}

impl std::error::Error for Error {}
