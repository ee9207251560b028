use crate::errors::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// An offer or answer produced by the real-time transport
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_m_line_index: index,
        }
    }
}

/// The `misc` field of a `connectivityCandidate` message. On the wire [`CandidatePayload::Last`]
/// is the bare string `"last"`
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum CandidatePayload {
    /// The peer has both descriptions set and will now accept candidates
    Last,
    Candidate(IceCandidate),
}

impl CandidatePayload {
    pub const LAST_MARKER: &'static str = "last";

    pub fn is_last(&self) -> bool {
        matches!(self, CandidatePayload::Last)
    }
}

impl TryFrom<Value> for CandidatePayload {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(marker) if marker == Self::LAST_MARKER => Ok(CandidatePayload::Last),
            Value::String(marker) => Err(Error::UnknownCandidateMarker(marker)),
            Value::Null => Err(Error::MissingPayload("connectivityCandidate")),
            value => serde_json::from_value(value)
                .map(CandidatePayload::Candidate)
                .map_err(|err| Error::MalformedPayload {
                    kind: "connectivityCandidate",
                    reason: err.to_string(),
                }),
        }
    }
}

impl From<CandidatePayload> for Value {
    fn from(payload: CandidatePayload) -> Self {
        match payload {
            CandidatePayload::Last => Value::String(CandidatePayload::LAST_MARKER.to_string()),
            CandidatePayload::Candidate(candidate) => serde_json::json!({
                "candidate": candidate.candidate,
                "sdpMid": candidate.sdp_mid,
                "sdpMLineIndex": candidate.sdp_m_line_index,
            }),
        }
    }
}

impl From<IceCandidate> for CandidatePayload {
    fn from(candidate: IceCandidate) -> Self {
        CandidatePayload::Candidate(candidate)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
}

impl MediaTrack {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }
}

/// Local media captured for a participant
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn has_kind(&self, kind: MediaKind) -> bool {
        self.tracks.iter().any(|track| track.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_marker_is_a_bare_string() {
        assert_eq!(
            serde_json::to_value(CandidatePayload::Last).unwrap(),
            json!("last")
        );
        let parsed: CandidatePayload = serde_json::from_value(json!("last")).unwrap();
        assert!(parsed.is_last());
    }

    #[test]
    fn candidate_uses_browser_field_names() {
        let parsed: CandidatePayload = serde_json::from_value(json!({
            "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        }))
        .unwrap();

        match parsed {
            CandidatePayload::Candidate(candidate) => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_m_line_index, Some(0));
            }
            CandidatePayload::Last => panic!("expected a candidate"),
        }
    }

    #[test]
    fn unknown_marker_is_rejected() {
        assert!(serde_json::from_value::<CandidatePayload>(json!("first")).is_err());
        assert!(serde_json::from_value::<CandidatePayload>(json!(null)).is_err());
    }

    #[test]
    fn session_description_type_field() {
        let value = serde_json::to_value(SessionDescription::offer("v=0")).unwrap();
        assert_eq!(value, json!({ "type": "offer", "sdp": "v=0" }));
    }
}
