pub mod config;
pub mod error;
pub mod logger;
pub mod observer;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use observer::{ChannelObserver, NoopObserver, SessionEvent, SessionObserver};
pub use peer::{ConnState, MediaStream, SessionConfig};
pub use session::{WhepClient, WhepSession};
pub use signaling::{HttpClient, ReqwestClient, SignalingResponse};

use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs one viewer session until Ctrl-C or until it goes offline.
pub async fn run(config: ViewerConfig) -> anyhow::Result<()> {
    logger::init(&config.log_level);

    let ice_servers = config.load_ice_servers()?;
    let client = WhepClient::with_defaults(
        ice_servers.as_deref(),
        config.request_timeout(),
        config.gather_timeout(),
    )?;

    let (observer, mut events) = ChannelObserver::new();
    let session = match client
        .connect(&config.session_config(), Arc::new(observer))
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session: {}", e);
            return Err(e.into());
        }
    };
    info!(session = session.id(), "Session negotiated, waiting for media");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::State(ConnState::Offline)) => {
                    warn!("Session went offline");
                    break;
                }
                Some(SessionEvent::Stream(Some(stream))) => {
                    info!(
                        stream_id = stream.id(),
                        tracks = stream.tracks().len(),
                        "Playing"
                    );
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    session.close().await?;
    Ok(())
}
