//! Host connection settings.
//!
//! ```toml
//! endpoint = "/dev/ttyACM0"
//! baud_rate = 115200
//! timeout_ms = 5000
//! retry_count = 3
//! retry_backoff_ms = 100
//! retry_exponential = false
//! retry_backoff_max_ms = 2000
//! retry_non_idempotent = false
//! poll_interval_ms = 2
//! event_queue_capacity = 256
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clawlink_core::{Backoff, RetryConfig, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "/dev/ttyACM0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Serial port path, e.g. `/dev/ttyACM0` or `COM3`.
    pub endpoint: String,
    pub baud_rate: u32,
    /// Per-attempt reply timeout, also used for the handshake.
    pub timeout_ms: u64,
    /// Additional attempts after a timeout.
    pub retry_count: u32,
    /// Fixed delay between attempts, or the first delay when exponential.
    pub retry_backoff_ms: u64,
    /// Double the delay after each retry, with jitter.
    pub retry_exponential: bool,
    /// Ceiling for exponential delays.
    pub retry_backoff_max_ms: u64,
    pub retry_non_idempotent: bool,
    pub poll_interval_ms: u64,
    /// Events held for `drain_events`; the oldest is dropped when full.
    pub event_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: 5_000,
            retry_count: 3,
            retry_backoff_ms: 100,
            retry_exponential: false,
            retry_backoff_max_ms: 2_000,
            retry_non_idempotent: false,
            poll_interval_ms: 2,
            event_queue_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = duration_ms(backoff);
        self
    }

    /// Switch to exponential backoff starting at `retry_backoff_ms`.
    pub fn with_exponential_backoff(mut self, max: Duration) -> Self {
        self.retry_exponential = true;
        self.retry_backoff_max_ms = duration_ms(max);
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    pub fn with_retry_non_idempotent(mut self, enabled: bool) -> Self {
        self.retry_non_idempotent = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn event_queue_capacity(&self) -> usize {
        self.event_queue_capacity.max(1)
    }

    pub fn retry(&self) -> RetryConfig {
        let delay = Duration::from_millis(self.retry_backoff_ms);
        let backoff = if self.retry_exponential {
            Backoff::Exponential {
                base: delay,
                factor: 2.0,
                max: Duration::from_millis(self.retry_backoff_max_ms),
                jitter: true,
            }
        } else {
            Backoff::Fixed { delay }
        };
        RetryConfig {
            max_retries: self.retry_count,
            backoff,
            retry_non_idempotent: self.retry_non_idempotent,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_reference_host() {
        let config = ClientConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_count, 3);
        assert!(!config.retry_non_idempotent);
        assert_eq!(config.retry().attempts_for(true), 4);
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "endpoint = \"/dev/ttyUSB1\"\nretry_count = 1").expect("write");

        let config = ClientConfig::load(file.path()).expect("load");
        assert_eq!(config.endpoint, "/dev/ttyUSB1");
        assert_eq!(config.retry_count, 1);
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "baudrate = 9600").expect("write");

        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            ClientConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn builder_sets_retry_policy() {
        let config = ClientConfig::default()
            .with_retry_count(2)
            .with_retry_backoff(Duration::from_millis(7))
            .with_retry_non_idempotent(true);

        let retry = config.retry();
        assert_eq!(retry.attempts_for(false), 3);
        assert_eq!(retry.delay_for_retry(0), Duration::from_millis(7));
    }

    #[test]
    fn exponential_backoff_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "retry_backoff_ms = 50\nretry_exponential = true\nretry_backoff_max_ms = 300"
        )
        .expect("write");

        let retry = ClientConfig::load(file.path()).expect("load").retry();
        assert_eq!(
            retry.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(50),
                factor: 2.0,
                max: Duration::from_millis(300),
                jitter: true,
            }
        );
        for attempt in 0..6 {
            assert!(retry.delay_for_retry(attempt) <= Duration::from_millis(450));
        }
    }

    #[test]
    fn builder_enables_exponential_backoff() {
        let config = ClientConfig::default()
            .with_retry_backoff(Duration::from_millis(10))
            .with_exponential_backoff(Duration::from_millis(80));

        assert!(config.retry_exponential);
        assert!(matches!(
            config.retry().backoff,
            Backoff::Exponential { base, max, .. }
                if base == Duration::from_millis(10) && max == Duration::from_millis(80)
        ));
        assert_eq!(
            ClientConfig::default().with_event_queue_capacity(0).event_queue_capacity(),
            1
        );
    }
}
