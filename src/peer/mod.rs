pub mod connection;
pub mod ice;
pub mod state;
pub mod transport;
pub mod types;

pub use connection::{WebRtcTransport, WebRtcTransportFactory};
pub use state::{SessionState, DEFAULT_GATHER_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use transport::{ConnectivityHandler, TrackHandler, Transport, TransportFactory};
pub use types::{
    ConnState, InboundTrack, MediaKind, MediaStream, SdpKind, ServerConfig, SessionConfig,
    SessionDescription,
};
