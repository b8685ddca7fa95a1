use thiserror::Error;

use crate::time::Millis;

pub const DEFAULT_HTTP_TIMEOUT_MS: Millis = 5_000;

/// Blocking GET used for the reachability check.
///
/// Returns the HTTP status code, or a negative transport error code when no
/// response was received.
pub trait HttpProbe {
    fn get(&mut self, url: &str, timeout_ms: Millis) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("failed to send request headers")]
    SendHeaderFailed,
    #[error("failed to send request payload")]
    SendPayloadFailed,
    #[error("not connected")]
    NotConnected,
    #[error("connection lost")]
    ConnectionLost,
    #[error("no stream")]
    NoStream,
    #[error("no HTTP server")]
    NoHttpServer,
    #[error("out of memory")]
    OutOfMemory,
    #[error("unsupported transfer encoding")]
    Encoding,
    #[error("stream write failed")]
    StreamWrite,
    #[error("read timeout")]
    ReadTimeout,
    #[error("transport error {0}")]
    Other(i32),
}

impl TransportError {
    pub fn code(self) -> i32 {
        match self {
            Self::ConnectionRefused => -1,
            Self::SendHeaderFailed => -2,
            Self::SendPayloadFailed => -3,
            Self::NotConnected => -4,
            Self::ConnectionLost => -5,
            Self::NoStream => -6,
            Self::NoHttpServer => -7,
            Self::OutOfMemory => -8,
            Self::Encoding => -9,
            Self::StreamWrite => -10,
            Self::ReadTimeout => -11,
            Self::Other(code) => code,
        }
    }

    /// `None` for non-negative codes, which are HTTP statuses.
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            0.. => return None,
            -1 => Self::ConnectionRefused,
            -2 => Self::SendHeaderFailed,
            -3 => Self::SendPayloadFailed,
            -4 => Self::NotConnected,
            -5 => Self::ConnectionLost,
            -6 => Self::NoStream,
            -7 => Self::NoHttpServer,
            -8 => Self::OutOfMemory,
            -9 => Self::Encoding,
            -10 => Self::StreamWrite,
            -11 => Self::ReadTimeout,
            other => Self::Other(other),
        };
        Some(err)
    }
}
