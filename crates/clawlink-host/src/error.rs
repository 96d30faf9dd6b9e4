use std::io;
use std::time::Duration;

use clawlink_core::{ErrorKind, FramingError};
use thiserror::Error;

/// Host-side failures. Device-reported errors are Responses, not `ClientError`s.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to open {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: serialport::Error,
    },

    #[error("no ready event within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("not connected; call connect() first")]
    NotConnected,

    #[error("failed to list serial ports: {0}")]
    PortEnumeration(#[source] serialport::Error),

    #[error("no device answered on {tried} candidate port(s)")]
    NoDevice { tried: usize },

    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Serialization(_) => ErrorKind::ProtocolDecode,
            Self::Connection { .. }
            | Self::HandshakeTimeout(_)
            | Self::NotConnected
            | Self::PortEnumeration(_)
            | Self::NoDevice { .. }
            | Self::Io(_) => ErrorKind::ConnectionFailure,
        }
    }
}

impl From<FramingError> for ClientError {
    fn from(error: FramingError) -> Self {
        match error {
            FramingError::Io(error) => Self::Io(error),
            FramingError::Serialization(error) => Self::Serialization(error),
            FramingError::EmbeddedNewline => Self::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "outgoing line contains a raw newline",
            )),
        }
    }
}
