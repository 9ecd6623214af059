//! # Broadcast Messages
//!
//! Wire form: `{"type": .., "data": .., "request_id": ..}`, with
//! `request_id` omitted when there is no correlation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::HubError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl BroadcastMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            request_id: None,
        }
    }

    /// Message tagged with the id of the request it answers.
    pub fn correlated(request_id: impl Into<String>, kind: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::new(kind, data)
        }
    }

    pub fn encode(&self) -> Result<String, HubError> {
        serde_json::to_string(self).map_err(|e| HubError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let plain = BroadcastMessage::new("job-completed", json!({"id": "job-1"}));
        let wire: Value = serde_json::from_str(&plain.encode().unwrap()).unwrap();
        assert_eq!(wire, json!({"type": "job-completed", "data": {"id": "job-1"}}));

        let tagged = BroadcastMessage::correlated("req-1", "job-completed", json!(null));
        let wire: Value = serde_json::from_str(&tagged.encode().unwrap()).unwrap();
        assert_eq!(wire["request_id"], "req-1");
    }
}
