//! # Request Correlation
//!
//! Every host request carries an `id` that the device echoes back in its
//! Response. The host uses it to tell a reply to the current request apart
//! from a late reply to an earlier one that already timed out.
//!
//! ```rust,ignore
//! use clawlink_core::RequestId;
//!
//! let id = RequestId::new_v4();
//! let request = Request::new(Instruction::ListTools).with_id(id.to_string());
//! ```

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifier (UUID v4) for request/response correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random UUID v4 request ID.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new_v4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_displays_as_hyphenated_uuid_v4() {
        let text = RequestId::new_v4().to_string();
        let uuid = Uuid::parse_str(&text).expect("uuid");
        assert_eq!(uuid.get_version_num(), 4);
        assert_eq!(text, uuid.hyphenated().to_string());
    }

    #[test]
    fn request_id_serializes_as_plain_string() {
        let request_id = RequestId::new_v4();
        assert_eq!(
            serde_json::to_value(request_id).expect("serialize"),
            serde_json::Value::String(request_id.to_string())
        );
    }

    #[test]
    fn fresh_ids_differ() {
        assert_ne!(RequestId::new_v4(), RequestId::new_v4());
    }
}
