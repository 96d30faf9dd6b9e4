use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared by the device agent and the host client.
///
/// Every error Response carries one of these as its `code` so that a host can
/// distinguish failures without parsing the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Endpoint could not be opened or the handshake never completed.
    ConnectionFailure,
    /// No reply arrived within the timeout window.
    Timeout,
    /// A received line is not a well-formed message.
    ProtocolDecode,
    /// Well-formed instruction with an unrecognised `type` or action.
    UnknownCommand,
    /// Instruction is missing a field its kind requires.
    MissingField,
    /// Instruction field has the wrong JSON type.
    InvalidField,
    UnknownTool,
    InvalidParameters,
    /// The tool body failed.
    ExecutionError,
    /// The device does not support the requested capability.
    Unsupported,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailure => "connection_failure",
            Self::Timeout => "timeout",
            Self::ProtocolDecode => "protocol_decode",
            Self::UnknownCommand => "unknown_command",
            Self::MissingField => "missing_field",
            Self::InvalidField => "invalid_field",
            Self::UnknownTool => "unknown_tool",
            Self::InvalidParameters => "invalid_parameters",
            Self::ExecutionError => "execution_error",
            Self::Unsupported => "unsupported",
        }
    }

    /// Parse a wire code. Unknown codes yield `None` so newer devices stay readable.
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "connection_failure" => Self::ConnectionFailure,
            "timeout" => Self::Timeout,
            "protocol_decode" => Self::ProtocolDecode,
            "unknown_command" => Self::UnknownCommand,
            "missing_field" => Self::MissingField,
            "invalid_field" => Self::InvalidField,
            "unknown_tool" => Self::UnknownTool,
            "invalid_parameters" => Self::InvalidParameters,
            "execution_error" => Self::ExecutionError,
            "unsupported" => Self::Unsupported,
            _ => return None,
        };
        Some(kind)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoding and validation failures for protocol messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("Invalid instruction format")]
    InvalidFormat,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Unknown {kind} action: {action}")]
    UnknownAction { kind: &'static str, action: String },
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid field '{field}': expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("Dynamic registration is not supported")]
    RegistrationUnsupported,
    #[error("message carries neither 'status' nor 'event'")]
    MissingDiscriminator,
    #[error("message carries both 'status' and 'event'")]
    AmbiguousDiscriminator,
    #[error("invalid response status '{0}'")]
    InvalidStatus(String),
    #[error("response violates status invariant: {0}")]
    MalformedResponse(&'static str),
}

impl ProtocolError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidJson
            | Self::InvalidFormat
            | Self::MissingDiscriminator
            | Self::AmbiguousDiscriminator
            | Self::InvalidStatus(_)
            | Self::MalformedResponse(_) => ErrorKind::ProtocolDecode,
            Self::UnknownCommand(_) | Self::UnknownAction { .. } => ErrorKind::UnknownCommand,
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::InvalidField { .. } => ErrorKind::InvalidField,
            Self::RegistrationUnsupported => ErrorKind::Unsupported,
        }
    }
}
