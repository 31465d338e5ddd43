//! Capability seam between the negotiation routine and the WebRTC stack.
//!
//! The routine only talks to these traits; [`crate::peer::connection`]
//! provides the webrtc-rs implementation and the tests provide fakes.

use crate::error::Result;
use crate::peer::types::{InboundTrack, MediaKind, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

pub type TrackHandler = Arc<dyn Fn(InboundTrack) + Send + Sync>;
pub type ConnectivityHandler = Arc<dyn Fn(RTCPeerConnectionState) + Send + Sync>;

/// One peer connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Installs the reaction to inbound tracks. Replaces any previous one.
    fn on_track(&self, handler: TrackHandler);

    /// Installs the reaction to peer connection state changes.
    fn on_connectivity_change(&self, handler: ConnectivityHandler);

    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Commits the local description. Implementations finish candidate
    /// gathering here since there is no trickle path.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn local_description(&self) -> Option<SessionDescription>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    fn connectivity(&self) -> RTCPeerConnectionState;

    async fn close(&self) -> Result<()>;
}

/// Creates a fresh transport per negotiation.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    type Transport: Transport;

    async fn create(&self) -> Result<Arc<Self::Transport>>;
}
