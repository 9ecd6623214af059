//! # Bus Messages
//!
//! Topic-addressed byte payloads with a natural key for dedupe.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;

/// A message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Named topic, e.g. `job-completed`.
    pub topic: String,
    /// Natural key consumers dedupe on.
    pub key: String,
    /// Opaque payload, JSON by convention.
    pub payload: Bytes,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    /// Topics to include (`None` means all).
    pub topics: Option<BTreeSet<String>>,
}

impl TopicFilter {
    /// Match every topic.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: None }
    }

    /// Match only the listed topics.
    #[must_use]
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: Some(topics.into_iter().map(Into::into).collect()),
        }
    }

    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        match &self.topics {
            None => true,
            Some(set) => set.contains(&message.topic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_all() {
        let msg = BusMessage::new("job-created", "1", "{}");
        assert!(TopicFilter::all().matches(&msg));
    }

    #[test]
    fn test_filter_topics() {
        let filter = TopicFilter::topics(["job-completed"]);
        assert!(filter.matches(&BusMessage::new("job-completed", "1", "{}")));
        assert!(!filter.matches(&BusMessage::new("job-created", "2", "{}")));
    }

    #[test]
    fn test_json_payload() {
        let msg = BusMessage::new("t", "1", r#"{"id":"job-1"}"#);
        let value: serde_json::Value = msg.json().unwrap();
        assert_eq!(value["id"], "job-1");
    }
}
