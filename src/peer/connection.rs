use crate::error::Result;
use crate::peer::ice::{analyze_candidates, dump_selected_pair, rtc_config, wait_for_gathering};
use crate::peer::transport::{ConnectivityHandler, TrackHandler, Transport, TransportFactory};
use crate::peer::types::{InboundTrack, MediaKind, MediaStream, SdpKind, ServerConfig, SessionDescription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

/// Builds webrtc-rs peer connections for viewer sessions.
pub struct WebRtcTransportFactory {
    api: API,
    config: RTCConfiguration,
    gather_timeout: Duration,
}

impl WebRtcTransportFactory {
    /// `ice_servers = None` falls back to the default STUN servers.
    pub fn new(ice_servers: Option<&[ServerConfig]>, gather_timeout: Duration) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            config: rtc_config(ice_servers),
            gather_timeout,
        })
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    type Transport = WebRtcTransport;

    async fn create(&self) -> Result<Arc<WebRtcTransport>> {
        let pc = Arc::new(self.api.new_peer_connection(self.config.clone()).await?);
        debug!(
            ice_servers = self.config.ice_servers.len(),
            "Peer connection created"
        );
        Ok(Arc::new(WebRtcTransport {
            pc,
            streams: Arc::new(Mutex::new(HashMap::new())),
            gather_timeout: self.gather_timeout,
        }))
    }
}

/// Receive-only peer connection backed by webrtc-rs.
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    /// Inbound aggregates by stream id.
    streams: Arc<Mutex<HashMap<String, MediaStream>>>,
    gather_timeout: Duration,
}

/// Files the track under its aggregate and describes it for the session.
fn group_track(
    streams: &Mutex<HashMap<String, MediaStream>>,
    track: Arc<TrackRemote>,
) -> Option<InboundTrack> {
    let kind = MediaKind::from_codec_type(track.kind())?;
    let stream_id = track.stream_id();

    let carried = if stream_id.is_empty() {
        Vec::new()
    } else {
        let stream = streams
            .lock()
            .entry(stream_id.clone())
            .or_insert_with(|| MediaStream::new(stream_id))
            .clone();
        stream.add_track(track.clone());
        vec![stream]
    };

    Some(InboundTrack {
        id: track.id(),
        kind,
        streams: carried,
    })
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> SessionDescription {
    let kind = match desc.sdp_type {
        RTCSdpType::Answer | RTCSdpType::Pranswer => SdpKind::Answer,
        _ => SdpKind::Offer,
    };
    SessionDescription {
        kind,
        sdp: desc.sdp,
    }
}

#[async_trait]
impl Transport for WebRtcTransport {
    fn on_track(&self, handler: TrackHandler) {
        let streams = self.streams.clone();
        self.pc
            .on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                info!(
                    track_id = %track.id(),
                    stream_id = %track.stream_id(),
                    kind = ?track.kind(),
                    "Received track"
                );
                if let Some(inbound) = group_track(&streams, track) {
                    handler(inbound);
                }
                Box::pin(async {})
            }));
    }

    fn on_connectivity_change(&self, handler: ConnectivityHandler) {
        let pc_stats: Weak<RTCPeerConnection> = Arc::downgrade(&self.pc);
        self.pc
            .on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
                info!("Peer connection state changed to: {:?}", st);

                // Снимаем статистику пары до того, как соединение закроется
                if st == RTCPeerConnectionState::Failed {
                    if let Some(pc) = pc_stats.upgrade() {
                        tokio::spawn(async move {
                            dump_selected_pair(&pc, "BEFORE-FAIL").await;
                        });
                    }
                }

                handler(st);
                Box::pin(async {})
            }));
    }

    async fn add_recvonly_transceiver(&self, kind: MediaKind) -> Result<()> {
        self.pc
            .add_transceiver_from_kind(
                kind.into(),
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        Ok(from_rtc(offer))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)?;
        // Промис берем до set_local_description, иначе завершение можно пропустить
        let done = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(desc).await?;

        if wait_for_gathering(done, self.gather_timeout).await {
            if let Some(local) = self.pc.local_description().await {
                analyze_candidates(&local.sdp);
            }
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc.local_description().await.map(from_rtc)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc(desc)?;
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    fn connectivity(&self) -> RTCPeerConnectionState {
        self.pc.connection_state()
    }

    async fn close(&self) -> Result<()> {
        let closed = self.pc.close().await;
        // агрегаты сбрасываем даже если закрытие не удалось
        self.streams.lock().clear();
        if let Err(e) = closed {
            warn!("Error closing peer connection: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
