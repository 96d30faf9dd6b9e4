use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    Usage(String),

    #[error(transparent)]
    Client(#[from] clawlink_host::ClientError),

    #[error(transparent)]
    Config(#[from] clawlink_host::ConfigError),

    #[error(transparent)]
    Agent(#[from] clawlink_agent::AgentError),

    #[error("failed to open {endpoint}: {source}")]
    Serial {
        endpoint: String,
        #[source]
        source: serialport::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("command worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Serialization(_) => 4,
            Self::Client(clawlink_host::ClientError::Serialization(_)) => 4,
            Self::Client(clawlink_host::ClientError::Io(_)) => 10,
            Self::Client(_) | Self::Serial { .. } => 6,
            Self::Config(_) => 7,
            Self::Agent(_) | Self::Io(_) | Self::Join(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clawlink_host::ClientError;

    use super::*;

    #[test]
    fn exit_codes_follow_categories() {
        assert_eq!(CliError::Usage("bad".into()).exit_code(), 2);
        assert_eq!(
            CliError::Client(ClientError::HandshakeTimeout(Duration::from_secs(5))).exit_code(),
            6
        );
        assert_eq!(CliError::Client(ClientError::NotConnected).exit_code(), 6);
        assert_eq!(
            CliError::Io(std::io::Error::other("broken pipe")).exit_code(),
            10
        );
    }
}
