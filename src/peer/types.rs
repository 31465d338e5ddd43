use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

/// Lifecycle of a viewer session as reported to observers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnState {
    /// Not started yet.
    #[default]
    Idle,
    /// Offer generation or HTTP exchange in flight.
    Connecting,
    /// The first inbound stream has arrived.
    Playing,
    /// Transport failed or closed, or the endpoint rejected the offer.
    Offline,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::Idle => "idle",
            ConnState::Connecting => "connecting",
            ConnState::Playing => "playing",
            ConnState::Offline => "offline",
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kind of a receive-only transceiver or an inbound track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl From<MediaKind> for RTPCodecType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => RTPCodecType::Video,
            MediaKind::Audio => RTPCodecType::Audio,
        }
    }
}

impl MediaKind {
    pub(crate) fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Video => Some(MediaKind::Video),
            RTPCodecType::Audio => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// Aggregate of inbound tracks sharing one stream id.
///
/// Clones share the same track list, so a stream handed to an observer
/// keeps filling up as the remaining tracks of the aggregate arrive.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    id: String,
    tracks: Mutex<Vec<Arc<TrackRemote>>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: id.into(),
                tracks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Snapshot of the tracks received so far.
    pub fn tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.inner.tracks.lock().clone()
    }

    pub(crate) fn add_track(&self, track: Arc<TrackRemote>) {
        self.inner.tracks.lock().push(track);
    }

    /// True when both handles point at the same aggregate.
    pub fn same_as(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks.lock().len())
            .finish()
    }
}

impl PartialEq for MediaStream {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || self.id() == other.id()
    }
}

/// One inbound track event as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundTrack {
    pub id: String,
    pub kind: MediaKind,
    /// Aggregates carrying this track; empty when the sender gave no msid.
    pub streams: Vec<MediaStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// SDP text tagged with its role in the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Per-session input for a WHEP negotiation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub whep_url: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl SessionConfig {
    pub fn new(whep_url: impl Into<String>) -> Self {
        Self {
            whep_url: whep_url.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// ICE server entry as read from the ICE servers JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' или 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnState::Playing).unwrap(),
            "\"playing\""
        );
        assert_eq!(ConnState::default(), ConnState::Idle);
        assert_eq!(ConnState::Offline.to_string(), "offline");
    }

    #[test]
    fn stream_clones_share_identity() {
        let a = MediaStream::new("s1");
        let b = a.clone();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&MediaStream::new("s1")));
        assert_eq!(a, MediaStream::new("s1"));
        assert!(a.tracks().is_empty());
    }

    #[test]
    fn server_config_reads_type_field() {
        let json = r#"[{"id":"t","type":"turn","url":"turn.example:3478","username":"u","credential":"c"}]"#;
        let servers: Vec<ServerConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(servers[0].r#type, "turn");
        assert_eq!(servers[0].username.as_deref(), Some("u"));
    }
}
