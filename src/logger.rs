use crate::observer::SessionObserver;
use crate::peer::types::{ConnState, MediaStream};
use tracing::{debug, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Timestamp layout for log lines.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false)
        .try_init();
}

pub fn emit_state(observer: &dyn SessionObserver, state: ConnState) {
    info!(%state, "Session state");
    observer.on_state(state);
}

pub fn emit_stream(observer: &dyn SessionObserver, stream: Option<MediaStream>) {
    match &stream {
        Some(s) => info!(stream_id = s.id(), "Inbound stream available"),
        None => debug!("Inbound stream cleared"),
    }
    observer.on_stream(stream);
}
