//! Error types for the WHEP viewer.

use thiserror::Error;

/// Result type alias using the viewer's error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The WHEP endpoint answered the offer with a non-2xx status.
    #[error("WHEP {status}")]
    Signaling { status: u16 },

    /// Raised by the WebRTC stack while building the session or committing
    /// a description. Passed through untouched.
    #[error(transparent)]
    Transport(#[from] webrtc::Error),

    /// The HTTP exchange itself could not complete (DNS, refused, timeout).
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// HTTP status carried by a signaling rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Signaling { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaling_error_formats_like_whep_status() {
        let err = Error::Signaling { status: 404 };
        assert_eq!(err.to_string(), "WHEP 404");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn transport_error_is_transparent() {
        let inner = webrtc::Error::ErrConnectionClosed;
        let expected = inner.to_string();
        let err: Error = inner.into();
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.status(), None);
    }
}
