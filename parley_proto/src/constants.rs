pub const MAJOR_VERSION: u8 = 0;
pub const MINOR_VERSION: u8 = 1;
pub const PATCH_VERSION: u8 = 0;

/// Applied to directory lookups only
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(10000);
/// The built-in JSON codec is always available under this locator
pub const BUILTIN_PLAIN_CODEC_LOCATOR: &str = "builtin:codec/plain";
pub const WEBFINGER_PROVIDER: &str = "webfinger";

/// Roles published in WebFinger properties. The property key is the URL, the value the role
pub const ROLE_LOCAL_STUB: &str = "localStub";
pub const ROLE_REMOTE_STUB: &str = "remoteStub";
pub const ROLE_MESSAGING_SERVER: &str = "messagingServer";
pub const ROLE_REMOTE_MESSAGING_SERVER: &str = "messagingServer_remote";

/// Fields of the first row of a JSONP directory record
pub const JSONP_STUB_FIELD: &str = "messagingStubURL";
pub const JSONP_SERVER_FIELD: &str = "messagingServer";

/// `(urls, username, credential)`
pub const DEFAULT_ICE_SERVERS: &[(&str, Option<&str>, Option<&str>)] = &[
    ("stun:stun.voiparound.com", None, None),
    ("stun:stun.voipbuster.com", None, None),
    ("stun:stun.voipstunt.com", None, None),
    ("stun:stun.voxgratia.org", None, None),
    ("stun:stun.ekiga.net", None, None),
    ("stun:stun.schlund.de", None, None),
    ("stun:stun.iptel.org", None, None),
    ("stun:stun.l.google.com:19302", None, None),
    ("stun:stun1.l.google.com:19302", None, None),
    ("stun:stun.ideasip.com", None, None),
    ("stun:stun4.l.google.com:19302", None, None),
    ("stun:stun2.l.google.com:19302", None, None),
    ("stun:stun3.l.google.com:19302", None, None),
    (
        "turn:192.158.29.39:3478?transport=tcp",
        Some("28224511:1379330808"),
        Some("JZEOEt2V3Qb0y27GRntt2u2PAYA="),
    ),
    (
        "turn:192.158.29.39:3478?transport=udp",
        Some("28224511:1379330808"),
        Some("JZEOEt2V3Qb0y27GRntt2u2PAYA="),
    ),
    ("turn:numb.viagenie.ca", Some("webrtc@live.com"), Some("muazkh")),
];
