//! WHEP negotiation routine and the session handle it returns.

use crate::error::{Error, Result};
use crate::logger::{emit_state, emit_stream};
use crate::observer::SessionObserver;
use crate::peer::connection::WebRtcTransportFactory;
use crate::peer::state::SessionState;
use crate::peer::transport::{Transport, TransportFactory};
use crate::peer::types::{
    ConnState, InboundTrack, MediaKind, MediaStream, ServerConfig, SessionConfig,
    SessionDescription,
};
use crate::signaling::{HttpClient, ReqwestClient};
use crate::utils::random_id;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Negotiates receive-only sessions against WHEP endpoints.
///
/// Both capabilities are injected so the routine runs the same against
/// webrtc-rs and reqwest as against test doubles.
pub struct WhepClient<F: TransportFactory> {
    factory: F,
    http: Arc<dyn HttpClient>,
}

impl WhepClient<WebRtcTransportFactory> {
    /// Production client: webrtc-rs transport and reqwest signaling.
    pub fn with_defaults(
        ice_servers: Option<&[ServerConfig]>,
        request_timeout: Duration,
        gather_timeout: Duration,
    ) -> Result<Self> {
        let factory = WebRtcTransportFactory::new(ice_servers, gather_timeout)?;
        let http = ReqwestClient::new(request_timeout)?;
        Ok(Self::new(factory, http))
    }
}

impl<F: TransportFactory> WhepClient<F> {
    pub fn new(factory: F, http: impl HttpClient + 'static) -> Self {
        Self {
            factory,
            http: Arc::new(http),
        }
    }

    /// Runs one offer/answer exchange and returns the live session.
    ///
    /// `Connecting` is reported before anything else. After this returns,
    /// `Playing` and `Offline` keep arriving from transport events until the
    /// caller closes the session. On a non-2xx answer `Offline` is reported,
    /// the transport is released and `Error::Signaling` is returned. Network
    /// and transport errors are returned unchanged.
    pub async fn connect(
        &self,
        config: &SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<WhepSession<F::Transport>> {
        let id = random_id();
        let span = info_span!("whep", session = %id);
        self.connect_inner(id, config, observer).instrument(span).await
    }

    async fn connect_inner(
        &self,
        id: String,
        config: &SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<WhepSession<F::Transport>> {
        info!(url = %config.whep_url, "Starting WHEP session");

        let state = Arc::new(SessionState::new());
        state.start();
        emit_state(&*observer, ConnState::Connecting);

        let transport = self.factory.create().await?;
        arm_reactions(&*transport, &state, &observer);

        match self.negotiate(&*transport, config, &state, &*observer).await {
            Ok(resource_url) => {
                info!(resource = ?resource_url, "Answer applied");
                Ok(WhepSession {
                    id,
                    transport,
                    state,
                    observer,
                    http: self.http.clone(),
                    resource_url,
                    auth_token: config.auth_token.clone(),
                })
            }
            Err(e) => {
                state.release();
                debug!(connectivity = ?transport.connectivity(), "Releasing transport");
                if let Err(close_err) = transport.close().await {
                    warn!("Failed to release transport after error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Steps after the reactions are armed. Returns the WHEP resource URL.
    async fn negotiate(
        &self,
        transport: &F::Transport,
        config: &SessionConfig,
        state: &SessionState,
        observer: &dyn SessionObserver,
    ) -> Result<Option<String>> {
        transport.add_recvonly_transceiver(MediaKind::Video).await?;
        transport.add_recvonly_transceiver(MediaKind::Audio).await?;

        let offer = transport.create_offer().await?;
        let offer_sdp = offer.sdp.clone();
        transport.set_local_description(offer).await?;

        // The committed description carries the gathered candidates.
        let body = transport
            .local_description()
            .await
            .map(|d| d.sdp)
            .filter(|sdp| !sdp.is_empty())
            .unwrap_or(offer_sdp);

        let response = self
            .http
            .post_sdp(&config.whep_url, &body, config.auth_token.as_deref())
            .await?;

        if !response.is_success() {
            warn!(
                status = response.status,
                body = %response.body,
                "WHEP endpoint rejected the offer"
            );
            {
                let _emission = state.emission();
                state.fail();
                emit_state(observer, ConnState::Offline);
                // later Failed/Closed events are the echo of this rejection
                state.release();
            }
            return Err(Error::Signaling {
                status: response.status,
            });
        }

        debug!(bytes = response.body.len(), "Received SDP answer");
        transport
            .set_remote_description(SessionDescription::answer(response.body))
            .await?;

        Ok(response.location)
    }
}

/// Installs the track and connectivity reactions for the session lifetime.
fn arm_reactions<T: Transport>(
    transport: &T,
    state: &Arc<SessionState>,
    observer: &Arc<dyn SessionObserver>,
) {
    let (track_state, track_observer) = (state.clone(), observer.clone());
    transport.on_track(Arc::new(move |track: InboundTrack| {
        let _emission = track_state.emission();
        match track_state.on_track(&track) {
            Some(stream) => {
                emit_state(&*track_observer, ConnState::Playing);
                emit_stream(&*track_observer, Some(stream));
            }
            None => debug!(track_id = %track.id, kind = ?track.kind, "Track not surfaced"),
        }
    }));

    let (conn_state, conn_observer) = (state.clone(), observer.clone());
    transport.on_connectivity_change(Arc::new(move |connectivity: RTCPeerConnectionState| {
        let _emission = conn_state.emission();
        if conn_state.on_connectivity(connectivity) {
            emit_state(&*conn_observer, ConnState::Offline);
        }
    }));
}

/// A negotiated viewer session. The caller owns it and must `close` it.
pub struct WhepSession<T: Transport> {
    id: String,
    transport: Arc<T>,
    state: Arc<SessionState>,
    observer: Arc<dyn SessionObserver>,
    http: Arc<dyn HttpClient>,
    resource_url: Option<String>,
    auth_token: Option<String>,
}

impl<T: Transport> std::fmt::Debug for WhepSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhepSession")
            .field("id", &self.id)
            .field("state", &self.state.current())
            .field("resource_url", &self.resource_url)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> WhepSession<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn state(&self) -> ConnState {
        self.state.current()
    }

    pub fn stream(&self) -> Option<MediaStream> {
        self.state.stream()
    }

    /// WHEP resource from the answer's `Location` header.
    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }

    /// Reports `Offline` (unless already offline) and clears the surfaced
    /// stream, then closes the transport and deletes the WHEP resource.
    ///
    /// The DELETE is best effort. Only a transport close failure is
    /// returned. Calling it again does nothing.
    pub async fn close(&self) -> Result<()> {
        if !self.release_and_report() {
            return Ok(());
        }
        debug!(
            session = %self.id,
            connectivity = ?self.transport.connectivity(),
            "Closing transport"
        );
        let closed = self.transport.close().await;

        if let Some(url) = &self.resource_url {
            match self.http.delete(url, self.auth_token.as_deref()).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!(session = %self.id, %url, "WHEP session deleted")
                }
                Ok(status) => warn!(
                    session = %self.id,
                    status,
                    "DELETE rejected, session may still exist server-side"
                ),
                Err(e) => warn!(session = %self.id, "DELETE failed: {}", e),
            }
        }
        closed
    }

    /// Releases the session and reports the teardown. Returns false when it
    /// was already released.
    fn release_and_report(&self) -> bool {
        let _emission = self.state.emission();
        if self.state.is_released() {
            return false;
        }
        let (previous, stream) = self.state.release();
        if previous != ConnState::Offline {
            emit_state(&*self.observer, ConnState::Offline);
        }
        if stream.is_some() {
            emit_stream(&*self.observer, None);
        }
        true
    }
}
