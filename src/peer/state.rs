use crate::peer::types::{ConnState, InboundTrack, MediaStream};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// ========== CONSTANTS ==========

/// Upper bound on the HTTP exchange with the WHEP endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on ICE gathering before the offer is posted as-is.
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(2);

/// Connectivity values that put the session offline.
pub fn is_terminal(state: RTCPeerConnectionState) -> bool {
    matches!(
        state,
        RTCPeerConnectionState::Failed
            | RTCPeerConnectionState::Disconnected
            | RTCPeerConnectionState::Closed
    )
}

/// ========== PER-SESSION STATE ==========

/// Observable state of one session, shared between the negotiation routine
/// and the transport event handlers.
///
/// Each method decides under a short state lock and returns what the caller
/// must emit. Callers hold [`SessionState::emission`] around decide+emit, so
/// one session's notifications never interleave and nothing is reported
/// after the session went offline for good.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Inner>,
    // сериализует уведомления наблюдателю
    emit: Mutex<()>,
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnState,
    stream: Option<MediaStream>,
    /// Set once the core or the caller released the transport; events that
    /// arrive afterwards are the echo of that release.
    released: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes notifications for this session. Not reentrant: observers
    /// must not call back into the session's `close` while it is held.
    pub fn emission(&self) -> MutexGuard<'_, ()> {
        self.emit.lock()
    }

    pub fn current(&self) -> ConnState {
        self.inner.lock().state
    }

    pub fn stream(&self) -> Option<MediaStream> {
        self.inner.lock().stream.clone()
    }

    pub fn start(&self) {
        self.inner.lock().state = ConnState::Connecting;
    }

    /// Returns the stream to surface when this track is the first one
    /// carrying an aggregate.
    pub fn on_track(&self, track: &InboundTrack) -> Option<MediaStream> {
        let mut inner = self.inner.lock();
        if inner.released || inner.state == ConnState::Offline || inner.stream.is_some() {
            return None;
        }
        let stream = track.streams.first()?.clone();
        inner.state = ConnState::Playing;
        inner.stream = Some(stream.clone());
        Some(stream)
    }

    /// Returns true when this connectivity change must be reported offline.
    pub fn on_connectivity(&self, connectivity: RTCPeerConnectionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.released || !is_terminal(connectivity) {
            return false;
        }
        inner.state = ConnState::Offline;
        true
    }

    /// Marks the session offline after a rejected exchange.
    pub fn fail(&self) {
        self.inner.lock().state = ConnState::Offline;
    }

    /// Stops reacting to transport events and moves the session offline.
    /// Returns the state it was in and the surfaced stream, if any; only the
    /// first call hands the stream back.
    pub fn release(&self) -> (ConnState, Option<MediaStream>) {
        let mut inner = self.inner.lock();
        inner.released = true;
        let previous = std::mem::replace(&mut inner.state, ConnState::Offline);
        (previous, inner.stream.take())
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::MediaKind;

    fn track(id: &str, streams: &[&MediaStream]) -> InboundTrack {
        InboundTrack {
            id: id.into(),
            kind: MediaKind::Video,
            streams: streams.iter().map(|s| (*s).clone()).collect(),
        }
    }

    #[test]
    fn only_first_stream_is_surfaced() {
        let state = SessionState::new();
        state.start();
        let stream = MediaStream::new("s");

        assert!(state.on_track(&track("a", &[])).is_none());
        assert_eq!(state.current(), ConnState::Connecting);

        let first = state.on_track(&track("v", &[&stream])).unwrap();
        assert!(first.same_as(&stream));
        assert_eq!(state.current(), ConnState::Playing);
        assert!(state.on_track(&track("a", &[&stream])).is_none());
    }

    #[test]
    fn every_terminal_change_goes_offline() {
        let state = SessionState::new();
        assert!(!state.on_connectivity(RTCPeerConnectionState::Connected));
        assert!(state.on_connectivity(RTCPeerConnectionState::Disconnected));
        assert!(state.on_connectivity(RTCPeerConnectionState::Failed));
        assert_eq!(state.current(), ConnState::Offline);

        // offline is terminal for playing
        assert!(state.on_track(&track("v", &[&MediaStream::new("s")])).is_none());
    }

    #[test]
    fn release_silences_events() {
        let state = SessionState::new();
        state.start();
        state.on_track(&track("v", &[&MediaStream::new("s")]));
        let (previous, stream) = state.release();
        assert_eq!(previous, ConnState::Playing);
        assert!(stream.is_some());
        assert_eq!(state.release(), (ConnState::Offline, None));
        assert!(!state.on_connectivity(RTCPeerConnectionState::Closed));
        assert!(state.is_released());
    }

    #[test]
    fn emission_is_exclusive() {
        let state = SessionState::new();
        let guard = state.emission();
        assert!(state.emit.try_lock().is_none());
        drop(guard);
        assert!(state.emit.try_lock().is_some());
    }
}
