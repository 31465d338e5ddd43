//! Observer contract for session lifecycle notifications.

use crate::peer::types::{ConnState, MediaStream};
use tokio::sync::mpsc;

/// Receives state and stream notifications for one session.
///
/// Both methods default to no-ops so implementors only override what they
/// care about. They are called from transport event tasks and must not
/// block.
///
/// Notifications for one session are delivered one at a time, in order.
/// Calling that session's `close` from inside a callback deadlocks.
pub trait SessionObserver: Send + Sync {
    fn on_state(&self, _state: ConnState) {}

    /// `Some` when the inbound aggregate arrives, `None` when the caller
    /// closes a session that had surfaced one.
    fn on_stream(&self, _stream: Option<MediaStream>) {}
}

/// Ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    State(ConnState),
    Stream(Option<MediaStream>),
}

/// Forwards notifications into a channel, in emission order.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_state(&self, state: ConnState) {
        let _ = self.tx.send(SessionEvent::State(state));
    }

    fn on_stream(&self, stream: Option<MediaStream>) {
        let _ = self.tx.send(SessionEvent::Stream(stream));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_keeps_order() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_state(ConnState::Connecting);
        observer.on_stream(None);
        observer.on_state(ConnState::Offline);

        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::State(ConnState::Connecting))
        ));
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Stream(None))));
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::State(ConnState::Offline))
        ));
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_state(ConnState::Playing);
        NoopObserver.on_state(ConnState::Playing);
    }
}
