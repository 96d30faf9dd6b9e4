use std::time::Duration;

use clawlink_core::DEFAULT_MAX_LINE_BYTES;
use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_MAX_HISTORY;
use crate::events::DEFAULT_EVENT_CAPACITY;

/// Device-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Firmware version reported in Ready and `system_info`.
    pub version: String,
    pub max_history: usize,
    /// Sleep between polls when no line is pending.
    #[serde(with = "millis")]
    pub idle_sleep: Duration,
    pub event_capacity: usize,
    pub max_line_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            max_history: DEFAULT_MAX_HISTORY,
            idle_sleep: Duration::from_millis(1),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl AgentConfig {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware() {
        let config = AgentConfig::default();
        assert_eq!(config.max_history, 10);
        assert_eq!(config.idle_sleep, Duration::from_millis(1));
        assert_eq!(config.max_line_bytes, 8 * 1024);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"version":"2.1.0","idle_sleep":5}"#).expect("parse");
        assert_eq!(config.version, "2.1.0");
        assert_eq!(config.idle_sleep, Duration::from_millis(5));
        assert_eq!(config.max_history, 10);
    }
}
